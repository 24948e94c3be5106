mod scpi;

pub(crate) use scpi::*;
