mod reader;
mod writer;


pub(crate) use self::{
    reader::{LogReadError, WriteLogReader},
    writer::{LogWriteError, WriteLogWriter},
};
