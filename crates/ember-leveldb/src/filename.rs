use std::path::{Path, PathBuf};

use crate::format::FileNumber;

/// The kind and canonical on-disk name of each file a database directory may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelDBFileName {
    /// `LOCK`, an empty advisory lockfile.
    Lock,
    /// `CURRENT`, containing the name of the latest `MANIFEST-{number}` file, newline-terminated.
    Current,
    /// `MANIFEST-{number}`, a write-log-framed stream of `VersionEdit`s.
    Manifest { file_number: u64 },
    /// `{number}.log`, a write-ahead log of serialized write batches for one memtable generation.
    Log { file_number: u64 },
    /// `{number}.ldb`, an on-disk sorted table file.
    Table { file_number: u64 },
    /// Any other file present in the database directory, ignored by this crate.
    Unknown,
}

impl LevelDBFileName {
    #[must_use]
    pub fn parse(file_name: &str) -> Self {
        if file_name == "LOCK" {
            return Self::Lock;
        }
        if file_name == "CURRENT" {
            return Self::Current;
        }
        if let Some(number) = file_name.strip_prefix("MANIFEST-") {
            if let Ok(file_number) = number.parse() {
                return Self::Manifest { file_number };
            }
        }
        if let Some(number) = file_name.strip_suffix(".log") {
            if let Ok(file_number) = number.parse() {
                return Self::Log { file_number };
            }
        }
        if let Some(number) = file_name.strip_suffix(".ldb") {
            if let Ok(file_number) = number.parse() {
                return Self::Table { file_number };
            }
        }
        Self::Unknown
    }

    #[must_use]
    pub fn file_name(self) -> String {
        match self {
            Self::Lock => "LOCK".to_owned(),
            Self::Current => "CURRENT".to_owned(),
            Self::Manifest { file_number } => format!("MANIFEST-{file_number:06}"),
            Self::Log { file_number } => format!("{file_number:06}.log"),
            Self::Table { file_number } => format!("{file_number:06}.ldb"),
            Self::Unknown => String::new(),
        }
    }

    #[must_use]
    pub fn path_in(self, db_directory: &Path) -> PathBuf {
        db_directory.join(self.file_name())
    }
}

#[must_use]
pub(crate) fn manifest_file_name(file_number: FileNumber) -> LevelDBFileName {
    LevelDBFileName::Manifest { file_number: file_number.0 }
}

#[must_use]
pub(crate) fn log_file_name(file_number: FileNumber) -> LevelDBFileName {
    LevelDBFileName::Log { file_number: file_number.0 }
}

#[must_use]
pub(crate) fn table_file_name(file_number: FileNumber) -> LevelDBFileName {
    LevelDBFileName::Table { file_number: file_number.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_kind() {
        for name in [
            LevelDBFileName::Lock,
            LevelDBFileName::Current,
            LevelDBFileName::Manifest { file_number: 42 },
            LevelDBFileName::Log { file_number: 7 },
            LevelDBFileName::Table { file_number: 123 },
        ] {
            assert_eq!(LevelDBFileName::parse(&name.file_name()), name);
        }
    }

    #[test]
    fn file_name_has_no_slash() {
        let path = LevelDBFileName::Table { file_number: 5 }.path_in(Path::new("/db"));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "000005.ldb");
    }

    #[test]
    fn unrecognized_names_are_unknown() {
        assert_eq!(LevelDBFileName::parse("random.txt"), LevelDBFileName::Unknown);
    }
}
