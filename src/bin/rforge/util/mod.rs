pub mod formula;
pub mod text;
