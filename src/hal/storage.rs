//! Persistent storage of the credential.
//!
//! The credential lives on a small byte-addressable EEPROM. Symbol `i` is
//! stored at `CREDENTIAL_BASE + SYMBOL_STRIDE * i`; the stride is inherited
//! from the page addressing of the original device and has no meaning of its
//! own.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::{
    error::StorageError,
    protocol::{Credential, CREDENTIAL_LEN},
};

/// Size of the emulated EEPROM (a 24C16).
pub const EEPROM_CAPACITY: usize = 2048;
/// Address of the first credential symbol.
pub const CREDENTIAL_BASE: u16 = 0x0311;
/// Distance between two consecutive credential symbols.
pub const SYMBOL_STRIDE: u16 = 8;

/// Value of an erased EEPROM cell.
const ERASED: u8 = 0xFF;

/// Byte-addressable non-volatile memory.
pub trait ByteStorage {
    fn capacity(&self) -> usize;
    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError>;
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError>;

    fn check_address(&self, address: u16) -> Result<(), StorageError> {
        if usize::from(address) < self.capacity() {
            Ok(())
        } else {
            Err(StorageError::OutOfRange {
                address,
                capacity: self.capacity(),
            })
        }
    }
}

/// Owner-facing view of the credential storage.
pub trait CredentialStore {
    fn load(&mut self) -> Result<Credential, StorageError>;
    fn store(&mut self, credential: &Credential) -> Result<(), StorageError>;
}

// StridedCredentialStore ======================================================

/// [`CredentialStore`] laying the credential out with the fixed base and
/// stride over any [`ByteStorage`].
#[derive(Debug)]
pub struct StridedCredentialStore<S> {
    storage: S,
}

impl<S: ByteStorage> StridedCredentialStore<S> {
    pub fn new(storage: S) -> Self {
        StridedCredentialStore { storage }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    fn address_of(index: usize) -> u16 {
        // index < CREDENTIAL_LEN, no overflow possible.
        CREDENTIAL_BASE + SYMBOL_STRIDE * index as u16
    }
}

impl<S: ByteStorage> CredentialStore for StridedCredentialStore<S> {
    fn load(&mut self) -> Result<Credential, StorageError> {
        let mut digits = [0_u8; CREDENTIAL_LEN];
        for (index, digit) in digits.iter_mut().enumerate() {
            let address = Self::address_of(index);
            let value = self.storage.read_byte(address)?;
            if value > 9 {
                return Err(StorageError::Corrupt { address, value });
            }
            *digit = value;
        }
        Ok(Credential::new(digits))
    }

    /// Write every symbol, then read the whole credential back. Anything but
    /// an exact round-trip is a storage failure.
    fn store(&mut self, credential: &Credential) -> Result<(), StorageError> {
        for (index, digit) in credential.digits().iter().enumerate() {
            self.storage.write_byte(Self::address_of(index), *digit)?;
        }
        if self.load()? != *credential {
            return Err(StorageError::VerifyFailed);
        }
        debug!("credential persisted and verified");
        Ok(())
    }
}

// MemoryEeprom ================================================================

/// Volatile EEPROM image; starts fully erased.
#[derive(Debug, Clone)]
pub struct MemoryEeprom {
    cells: Vec<u8>,
}

impl MemoryEeprom {
    pub fn new() -> Self {
        MemoryEeprom {
            cells: vec![ERASED; EEPROM_CAPACITY],
        }
    }
}

impl Default for MemoryEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStorage for MemoryEeprom {
    fn capacity(&self) -> usize {
        self.cells.len()
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        self.check_address(address)?;
        Ok(self.cells[usize::from(address)])
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError> {
        self.check_address(address)?;
        self.cells[usize::from(address)] = value;
        Ok(())
    }
}

// FileEeprom ==================================================================

/// EEPROM image kept in a file so the credential survives restarts.
#[derive(Debug)]
pub struct FileEeprom {
    path: PathBuf,
    file: File,
}

impl FileEeprom {
    /// Open the image at `path`, creating (or growing) it with erased cells
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let length = file.metadata()?.len() as usize;
        if length < EEPROM_CAPACITY {
            info!(
                "initializing EEPROM image {} ({} erased bytes)",
                path.display(),
                EEPROM_CAPACITY - length
            );
            file.seek(SeekFrom::End(0))?;
            file.write_all(&vec![ERASED; EEPROM_CAPACITY - length])?;
            file.sync_all()?;
        }

        Ok(FileEeprom { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStorage for FileEeprom {
    fn capacity(&self) -> usize {
        EEPROM_CAPACITY
    }

    fn read_byte(&mut self, address: u16) -> Result<u8, StorageError> {
        self.check_address(address)?;
        let mut cell = [0_u8; 1];
        self.file.seek(SeekFrom::Start(u64::from(address)))?;
        self.file.read_exact(&mut cell)?;
        Ok(cell[0])
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StorageError> {
        self.check_address(address)?;
        self.file.seek(SeekFrom::Start(u64::from(address)))?;
        self.file.write_all(&[value])?;
        self.file.sync_data()?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
fn scratch_image(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "doorlock-{}-{}.eeprom",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn credential_round_trips_through_memory() {
    let mut store = StridedCredentialStore::new(MemoryEeprom::new());
    let credential = Credential::new([1, 2, 3, 4, 5, 6]);
    store.store(&credential).unwrap();
    assert_eq!(store.load().unwrap(), credential);
}

#[test]
fn symbols_use_the_strided_layout() {
    let mut store = StridedCredentialStore::new(MemoryEeprom::new());
    store.store(&Credential::new([9, 8, 7, 6, 5, 4])).unwrap();
    let mut eeprom = store.into_inner();
    assert_eq!(eeprom.read_byte(0x0311).unwrap(), 9);
    assert_eq!(eeprom.read_byte(0x0319).unwrap(), 8);
    assert_eq!(eeprom.read_byte(0x0339).unwrap(), 4);
    // Padding between symbols is left untouched.
    assert_eq!(eeprom.read_byte(0x0312).unwrap(), ERASED);
}

#[test]
fn blank_eeprom_is_not_a_credential() {
    let mut store = StridedCredentialStore::new(MemoryEeprom::new());
    match store.load() {
        Err(StorageError::Corrupt { address, value }) => {
            assert_eq!(address, CREDENTIAL_BASE);
            assert_eq!(value, ERASED);
        }
        other => panic!("expected a corrupt cell, got {:?}", other),
    }
}

#[test]
fn out_of_range_address_is_rejected() {
    let mut eeprom = MemoryEeprom::new();
    assert!(matches!(
        eeprom.write_byte(EEPROM_CAPACITY as u16, 1),
        Err(StorageError::OutOfRange { .. })
    ));
}

#[test]
fn file_image_survives_reopen() {
    let path = scratch_image("reopen");
    let credential = Credential::new([0, 4, 2, 0, 4, 2]);
    {
        let mut store = StridedCredentialStore::new(FileEeprom::open(&path).unwrap());
        store.store(&credential).unwrap();
    }
    let mut store = StridedCredentialStore::new(FileEeprom::open(&path).unwrap());
    assert_eq!(store.load().unwrap(), credential);
    assert_eq!(
        std::fs::metadata(&path).unwrap().len() as usize,
        EEPROM_CAPACITY
    );
    let _ = std::fs::remove_file(&path);
}
