pub mod sysexio;
