use std::io;

/// A source of the local host's name.
///
/// The host name only makes session names traceable, so failures are never fatal: the cache
/// substitutes `unknown` when [`hostname`](Self::hostname) errors.
///
/// The trait is implemented for functions returning `io::Result<String>`.
pub trait HostIdentity {
    /// Look up the host name.
    ///
    /// # Errors
    ///
    /// Returns an error if the host name can't be determined.
    fn hostname(&self) -> io::Result<String>;
}

impl<F> HostIdentity for F
where
    F: Fn() -> io::Result<String>,
{
    fn hostname(&self) -> io::Result<String> {
        self()
    }
}

/// The operating system's host name.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalHost;

impl HostIdentity for LocalHost {
    fn hostname(&self) -> io::Result<String> {
        hostname::get()?.into_string().map_err(|name| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{name:?} contains invalid UTF-8"),
            )
        })
    }
}
