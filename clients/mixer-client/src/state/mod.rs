//! Client-side state: the commitment tree mirror and the note list

pub mod merkle_tree;
pub mod note;
pub mod note_store;

pub use merkle_tree::{MembershipProof, MerkleAccumulator};
pub use note::{Note, NoteManager};
pub use note_store::{FileNoteStore, InMemoryNoteStore, NoteBook, NoteStore};
