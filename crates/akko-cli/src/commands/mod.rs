pub mod entries;
pub mod inspect;
