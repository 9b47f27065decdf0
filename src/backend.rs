use clap::ValueEnum;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted Redis-compatible service.
    #[cfg(feature = "redis")]
    Redis,
    /// In-process store; parses and batches without touching a service.
    Memory,
}
