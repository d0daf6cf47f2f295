pub mod track;

pub use track::{TrackRecorder, TrackRow};
