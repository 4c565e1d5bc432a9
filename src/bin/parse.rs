use std::io::BufRead;
use std::process;

use socialrank::encode;
use socialrank::loader::{parse_edge, Edge};

// reads a text edge list from stdin and writes the binary format:
//
//     offset: [u64; max_node_id+1],
//     target: [u32; edges],
//
// lines starting with '#' and malformed lines are skipped.

fn main() {
    let target = match std::env::args().nth(1) {
        Some(target) => target,
        None => {
            println!("usage: parse <target>");
            println!("will overwrite <target>.offsets and <target>.targets");
            process::exit(2);
        }
    };
    println!("target: {}", target);

    let input = ::std::io::stdin();
    let mut edges: Vec<Edge> = Vec::new();
    for line in input.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                eprintln!("error reading input: {}", e);
                process::exit(1);
            }
        };
        if line.starts_with('#') { continue; }
        edges.extend(parse_edge(&line));
    }

    edges.sort_unstable();
    edges.dedup();
    println!("edges: {}", edges.len());

    match encode::write(&target, edges) {
        Ok(nodes) => println!("nodes: {}", nodes),
        Err(e) => {
            eprintln!("error writing {}: {}", target, e);
            process::exit(1);
        }
    }
}
