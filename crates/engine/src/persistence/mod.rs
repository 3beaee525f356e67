mod atomic_io;

pub(crate) use atomic_io::write_text_atomic;
