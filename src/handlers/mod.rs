pub mod challenge;
pub mod push;
pub mod salmon;
