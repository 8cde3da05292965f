#[cfg(feature = "detect-rustface")]
pub mod rustface;
pub mod stub;

#[cfg(feature = "detect-rustface")]
pub use self::rustface::RustfaceBackend;
pub use stub::StubBackend;
