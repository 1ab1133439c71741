pub mod isbn;

pub use isbn::{Isbn, pick_isbns};
