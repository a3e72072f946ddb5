use std::{
    fs::File,
    io::{BufRead, BufReader, ErrorKind, Read, Write},
    path::Path,
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::prelude::{Error, SdResult};

/// Frame terminator for outbound commands
pub const COMMAND_TERMINATOR: u8 = 0;

/// A bidirectional byte stream to the debugged kernel
pub trait Transport: Read + Write {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> SdResult<()> {
        if timeout.is_some() {
            log::warn!("Read timeouts are not supported by this transport, reads may block");
        }
        Ok(())
    }
}

/// The concrete transports a channel path can refer to
pub enum Device {
    /// windows named pipes and serial character devices
    Pipe(File),
    #[cfg(unix)]
    Socket(UnixStream),
    /// `<path>.in` carries commands to the kernel, `<path>.out` its replies,
    /// the layout qemu uses for `-serial pipe:<path>`
    #[cfg(unix)]
    FifoPair { reader: File, writer: File },
}

#[cfg(unix)]
fn with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    name.into()
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    File::options().read(true).write(true).open(path)
}

impl Device {
    pub fn open(path: &Path) -> SdResult<Self> {
        let err = |source| Error::ChannelOpen {
            path: path.into(),
            source,
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            match std::fs::metadata(path) {
                Ok(meta) if meta.file_type().is_socket() => {
                    log::info!("Connecting to socket {:?}", path);
                    return Ok(Self::Socket(UnixStream::connect(path).map_err(err)?));
                }
                // a single fifo would hand our own commands back to us
                Ok(meta) if meta.file_type().is_fifo() => {
                    return Err(err(std::io::Error::new(
                        ErrorKind::InvalidInput,
                        "a fifo only carries one direction, create <path>.in and <path>.out instead",
                    )));
                }
                Ok(_) => (),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    let (input, output) = (with_suffix(path, ".in"), with_suffix(path, ".out"));
                    if !(input.exists() && output.exists()) {
                        return Err(err(e));
                    }
                    log::info!("Opening fifo pair {:?} / {:?}", input, output);
                    // read-write opens do not wait for the other end
                    return Ok(Self::FifoPair {
                        reader: open_rw(&output).map_err(err)?,
                        writer: open_rw(&input).map_err(err)?,
                    });
                }
                Err(e) => return Err(err(e)),
            }
        }

        log::info!("Opening pipe {:?}", path);
        Ok(Self::Pipe(open_rw(path).map_err(err)?))
    }
}

impl Read for Device {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Pipe(f) => f.read(buf),
            #[cfg(unix)]
            Self::Socket(s) => s.read(buf),
            #[cfg(unix)]
            Self::FifoPair { reader, .. } => reader.read(buf),
        }
    }
}

impl Write for Device {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Pipe(f) => f.write(buf),
            #[cfg(unix)]
            Self::Socket(s) => s.write(buf),
            #[cfg(unix)]
            Self::FifoPair { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Pipe(f) => f.flush(),
            #[cfg(unix)]
            Self::Socket(s) => s.flush(),
            #[cfg(unix)]
            Self::FifoPair { writer, .. } => writer.flush(),
        }
    }
}

impl Transport for Device {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> SdResult<()> {
        match self {
            #[cfg(unix)]
            Self::Socket(s) => Ok(s.set_read_timeout(timeout)?),
            _ => {
                if timeout.is_some() {
                    log::warn!("Pipes do not support read timeouts, reads may block");
                }
                Ok(())
            }
        }
    }
}

/// Half-duplex command channel.
/// Commands go out NUL terminated, replies come back one line at a time.
pub struct Channel<T: Transport> {
    stream: BufReader<T>,
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            stream: BufReader::new(transport),
        }
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> SdResult<()> {
        self.stream.get_mut().set_read_timeout(timeout)
    }

    /// Writes `command` followed by a single NUL.
    /// The frame has no escaping so the command itself must not contain NUL.
    pub fn send(&mut self, command: &str) -> SdResult<()> {
        if command.as_bytes().contains(&COMMAND_TERMINATOR) {
            return Err(Error::EmbeddedNul(command.into()));
        }

        let mut frame = Vec::with_capacity(command.len() + 1);
        frame.extend_from_slice(command.as_bytes());
        frame.push(COMMAND_TERMINATOR);

        let out = self.stream.get_mut();
        out.write_all(&frame).map_err(Self::map_io)?;
        out.flush().map_err(Self::map_io)?;
        log::trace!("sent {:?}", command);
        Ok(())
    }

    /// Blocks until a full line arrived and returns it without the
    /// trailing terminator and whitespace.
    pub fn receive_line(&mut self) -> SdResult<String> {
        let mut buffer = Vec::new();
        let read = self
            .stream
            .read_until(b'\n', &mut buffer)
            .map_err(Self::map_io)?;
        if read == 0 {
            return Err(Error::ChannelClosed);
        }

        let line = String::from_utf8_lossy(&buffer).trim_end().to_string();
        log::trace!("received {:?}", line);
        Ok(line)
    }

    pub fn get_ref(&self) -> &T {
        self.stream.get_ref()
    }

    fn map_io(err: std::io::Error) -> Error {
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::ChannelTimeout,
            ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe => Error::ChannelClosed,
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::{Cursor, ErrorKind, Read, Write};

    use super::{Channel, Transport};
    use crate::prelude::Error;

    /// In-memory kernel side of a channel
    #[derive(Default)]
    pub struct Loopback {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl Loopback {
        pub fn with_replies(replies: &str) -> Self {
            Self {
                input: Cursor::new(replies.as_bytes().to_vec()),
                output: vec![],
            }
        }
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Loopback {}

    /// A transport whose reads always time out
    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::WouldBlock.into())
        }
    }

    impl Write for Stalled {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Stalled {}

    /// A transport where every read and write fails with `kind`
    pub struct Broken {
        pub kind: ErrorKind,
        pub reads: usize,
    }

    impl Broken {
        pub fn new(kind: ErrorKind) -> Self {
            Self { kind, reads: 0 }
        }
    }

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            Err(self.kind.into())
        }
    }

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(self.kind.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(self.kind.into())
        }
    }

    impl Transport for Broken {}

    #[test]
    fn send_is_nul_terminated() {
        let mut channel = Channel::new(Loopback::default());
        channel.send("dump").unwrap();
        assert_eq!(b"dump\0".to_vec(), channel.get_ref().output);
    }

    #[test]
    fn send_rejects_nul() {
        let mut channel = Channel::new(Loopback::default());
        assert!(matches!(
            channel.send("du\0mp"),
            Err(Error::EmbeddedNul(_))
        ));
        assert!(channel.get_ref().output.is_empty());
    }

    #[test]
    fn receive_lines() {
        let mut channel = Channel::new(Loopback::with_replies("0x1000\r\n2000  \n\nlast"));
        assert_eq!("0x1000", channel.receive_line().unwrap());
        assert_eq!("2000", channel.receive_line().unwrap());
        assert_eq!("", channel.receive_line().unwrap());
        assert_eq!("last", channel.receive_line().unwrap());
        assert!(matches!(channel.receive_line(), Err(Error::ChannelClosed)));
    }

    #[test]
    fn receive_timeout() {
        let mut channel = Channel::new(Stalled);
        assert!(matches!(channel.receive_line(), Err(Error::ChannelTimeout)));
    }

    #[cfg(unix)]
    #[test]
    fn socket_device() {
        use super::Device;
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut channel = Channel::new(Device::open(&path).unwrap());
        let (mut kernel, _) = listener.accept().unwrap();

        channel.send("regs").unwrap();
        let mut frame = [0u8; 5];
        kernel.read_exact(&mut frame).unwrap();
        assert_eq!(b"regs\0", &frame);

        kernel.write_all(b"0x10\n\n").unwrap();
        assert_eq!("0x10", channel.receive_line().unwrap());
        assert_eq!("", channel.receive_line().unwrap());

        channel
            .set_read_timeout(Some(std::time::Duration::from_millis(10)))
            .unwrap();
        assert!(matches!(channel.receive_line(), Err(Error::ChannelTimeout)));
    }

    #[test]
    fn open_missing_device() {
        use super::Device;

        let dir = tempfile::tempdir().unwrap();
        let res = Device::open(&dir.path().join("nutshell"));
        assert!(matches!(res, Err(Error::ChannelOpen { .. })));
    }

    #[test]
    fn broken_transport() {
        let mut channel = Channel::new(Broken::new(ErrorKind::BrokenPipe));
        assert!(matches!(channel.send("dump"), Err(Error::ChannelClosed)));

        let mut channel = Channel::new(Broken::new(ErrorKind::UnexpectedEof));
        assert!(matches!(channel.receive_line(), Err(Error::ChannelClosed)));

        let mut channel = Channel::new(Broken::new(ErrorKind::PermissionDenied));
        let res = channel.send("dump");
        assert!(matches!(res, Err(Error::Io(_))));
        assert!(res.unwrap_err().is_fatal());
    }

    #[cfg(unix)]
    fn mkfifo(path: &std::path::Path) {
        let status = std::process::Command::new("mkfifo")
            .arg(path)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn single_fifo_is_refused() {
        use super::Device;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nutshell");
        mkfifo(&path);

        let res = Device::open(&path);
        assert!(matches!(
            res,
            Err(Error::ChannelOpen { source, .. }) if source.kind() == ErrorKind::InvalidInput
        ));
    }

    #[cfg(unix)]
    #[test]
    fn fifo_pair_device() {
        use super::Device;
        use std::fs::File;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nutshell");
        mkfifo(&dir.path().join("nutshell.in"));
        mkfifo(&dir.path().join("nutshell.out"));

        let mut channel = Channel::new(Device::open(&path).unwrap());
        // the device holds both ends open, so neither of these blocks
        let mut kernel_in = File::open(dir.path().join("nutshell.in")).unwrap();
        let mut kernel_out = File::options()
            .write(true)
            .open(dir.path().join("nutshell.out"))
            .unwrap();

        channel.send("dump").unwrap();
        let mut frame = [0u8; 5];
        kernel_in.read_exact(&mut frame).unwrap();
        assert_eq!(b"dump\0", &frame);

        kernel_out.write_all(b"0x1000\n\n").unwrap();
        assert_eq!("0x1000", channel.receive_line().unwrap());
        assert_eq!("", channel.receive_line().unwrap());
    }
}
