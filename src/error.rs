use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What stopped the program before or during the scan.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not prepare the dump directory")]
    Dump,
    #[display("scan aborted")]
    Scan,
}
