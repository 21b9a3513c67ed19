pub mod info;
pub mod normalize;
pub mod select;
pub mod tracks;
