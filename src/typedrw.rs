use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use memmap::Mmap;

use crate::error::{Error, Result};

/// Fixed-width little-endian words stored back to back in a file.
pub trait Word: Copy {
    const WIDTH: usize;
    fn read(bytes: &[u8]) -> Self;
}

impl Word for u32 {
    const WIDTH: usize = 4;
    fn read(bytes: &[u8]) -> u32 { LittleEndian::read_u32(bytes) }
}

impl Word for u64 {
    const WIDTH: usize = 8;
    fn read(bytes: &[u8]) -> u64 { LittleEndian::read_u64(bytes) }
}

pub struct TypedMemoryMap<T: Word> {
    map:    Option<Mmap>,   // empty files cannot be mapped
    len:    usize,          // in words; trailing partial words are ignored
    phn:    PhantomData<T>,
}

impl<T: Word> TypedMemoryMap<T> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TypedMemoryMap<T>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::resource(path, e))?;
        let size = file.metadata().map_err(|e| Error::resource(path, e))?.len() as usize;
        let map = if size == 0 {
            None
        } else {
            // the file is only read, and not expected to change while mapped
            Some(unsafe { Mmap::map(&file) }.map_err(|e| Error::resource(path, e))?)
        };
        Ok(TypedMemoryMap {
            map,
            len: size / T::WIDTH,
            phn: PhantomData,
        })
    }

    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }

    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len { return None; }
        let map = self.map.as_ref()?;
        let start = index * T::WIDTH;
        Some(T::read(&map[start..start + T::WIDTH]))
    }
}

#[test]
fn reads_little_endian_words() {
    use std::io::Write;
    let dir = ::tempdir::TempDir::new("typedrw").unwrap();
    let path = dir.path().join("words");
    let mut file = File::create(&path).unwrap();
    file.write_all(&[1, 0, 0, 0, 0, 1, 0, 0, 7]).unwrap();
    drop(file);

    let words: TypedMemoryMap<u32> = TypedMemoryMap::open(&path).unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words.get(0), Some(1));
    assert_eq!(words.get(1), Some(256));
    assert_eq!(words.get(2), None);
}

#[test]
fn empty_file_maps_to_nothing() {
    let dir = ::tempdir::TempDir::new("typedrw").unwrap();
    let path = dir.path().join("empty");
    File::create(&path).unwrap();
    let words: TypedMemoryMap<u64> = TypedMemoryMap::open(&path).unwrap();
    assert!(words.is_empty());
    assert_eq!(words.get(0), None);
}
