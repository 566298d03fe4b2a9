pub mod autoplay;
pub mod chart;
pub mod clock;
pub mod history;
pub mod judgment;
pub mod note;
pub mod parsing;
pub mod snapshot;
