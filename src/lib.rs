pub mod account;
pub mod aes_gcm;
pub mod base64_blobs;
pub mod blob_store;
pub mod config;
pub mod coursework;
pub mod decryption;
pub mod desk;
pub mod encrypted;
pub mod error;
pub mod hybrid;
pub mod id;
pub mod key_pair;
pub mod keystore;
pub mod lock;
pub mod logging;
pub mod plagiarism;
pub mod private_key;
pub mod public_key;
pub mod registry;
pub mod salt;
pub mod session;
pub mod submission;
pub mod users;

#[cfg(test)]
mod test_keys;

pub use account::Account;
pub use blob_store::{BlobStore, DirBlobStore, MemoryBlobStore};
pub use config::Config;
pub use desk::{Desk, OpenedSubmission};
pub use error::{Error, Result};
pub use id::Uid;
pub use key_pair::KeyPair;
pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use registry::{Ledger, Registry, SharedLedger};
pub use session::Session;
pub use users::Role;
