#[cfg(feature = "backend-opencv")]
pub mod opencv;

#[cfg(feature = "backend-opencv")]
pub use opencv::OpenCvMog2Backend;
