pub mod acquire;
pub mod dsp;
pub mod extract;
pub mod keytag;
pub mod post;
pub mod separate;
pub mod tempo;
