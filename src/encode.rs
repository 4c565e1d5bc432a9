use std::fs::File;
use std::io::{BufWriter, Error, ErrorKind, Result, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::loader::{Edge, Node};

// output file format is
//
//     offset: [u64; max_node_id+1],
//     target: [u32; edges],
//
// target[offset[i-1]..offset[i]] are node i's edge targets (offset[-1] = 0).

/// Writes `pairs`, which must arrive sorted by source, as `<target>.offsets`
/// and `<target>.targets`. Returns the number of nodes written.
pub fn write<I>(target: &str, pairs: I) -> Result<usize> where I: IntoIterator<Item = Edge> {

    let mut node_writer = BufWriter::new(File::create(format!("{}.offsets", target))?);
    let mut edge_writer = BufWriter::new(File::create(format!("{}.targets", target))?);

    let mut cur_source = 0u64;
    let mut cur_offset = 0u64;
    let mut max_vertex: Option<Node> = None;

    for (source, target) in pairs {
        if u64::from(source) < cur_source {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("edge ({}, {}) out of order", source, target),
            ));
        }
        while cur_source < u64::from(source) {
            node_writer.write_u64::<LittleEndian>(cur_offset)?;
            cur_source += 1;
        }

        max_vertex = Some(max_vertex.map_or(source.max(target), |m| m.max(source).max(target)));

        edge_writer.write_u32::<LittleEndian>(target)?;
        cur_offset += 1;
    }

    // nodes past the last source still need (empty) entries
    if let Some(max_vertex) = max_vertex {
        log::info!("max vertex: {}", max_vertex);
        while cur_source <= u64::from(max_vertex) {
            node_writer.write_u64::<LittleEndian>(cur_offset)?;
            cur_source += 1;
        }
    }

    node_writer.flush()?;
    edge_writer.flush()?;
    Ok(cur_source as usize)
}

#[test]
fn rejects_unsorted_sources() {
    let dir = ::tempdir::TempDir::new("encode").unwrap();
    let target = dir.path().join("graph").to_string_lossy().into_owned();
    let result = write(&target, vec![(3, 1), (1, 2)]);
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidInput);
}

#[test]
fn empty_input_writes_empty_files() {
    let dir = ::tempdir::TempDir::new("encode").unwrap();
    let target = dir.path().join("graph").to_string_lossy().into_owned();
    assert_eq!(write(&target, Vec::new()).unwrap(), 0);
    assert_eq!(std::fs::metadata(format!("{}.offsets", target)).unwrap().len(), 0);
}
