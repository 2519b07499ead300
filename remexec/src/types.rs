use crate::error::{Error, Result};
use protobuf::remote_execution as proto;
use std::{fmt, str::FromStr};

pub type InstanceName = String;
pub type Chunk = bytes::Bytes;

/// Content identity of an action or blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    pub hash: String,
    pub size_bytes: u64,
}

impl Digest {
    pub fn new(hash: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            hash: hash.into(),
            size_bytes,
        }
    }

    /// Converts an optional wire digest. An absent digest reads as the empty digest.
    pub(crate) fn from_wire(digest: Option<proto::Digest>) -> Result<Self> {
        digest.map_or_else(|| Ok(Self::default()), Self::try_from)
    }
}

/// Sizes above `i64::MAX` have no wire form.
impl TryFrom<&Digest> for proto::Digest {
    type Error = Error;

    fn try_from(digest: &Digest) -> Result<Self> {
        let size_bytes = i64::try_from(digest.size_bytes)
            .map_err(|_| Error::ProtocolViolation("malformed digest"))?;
        Ok(Self {
            hash: digest.hash.clone(),
            size_bytes,
        })
    }
}

impl TryFrom<proto::Digest> for Digest {
    type Error = Error;

    fn try_from(digest: proto::Digest) -> Result<Self> {
        let size_bytes = u64::try_from(digest.size_bytes)
            .map_err(|_| Error::ProtocolViolation("malformed digest"))?;
        Ok(Self {
            hash: digest.hash,
            size_bytes,
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.hash, self.size_bytes)
    }
}

/// Parses the `<hash>/<size>` form produced by `Display`.
impl FromStr for Digest {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (hash, size) = s
            .split_once('/')
            .ok_or_else(|| "Required format is HASH/SIZE".to_string())?;
        if hash.is_empty() {
            return Err("digest hash is empty".to_string());
        }
        let size_bytes = size.parse().map_err(|_| format!("bad digest size {:?}", size))?;
        Ok(Self::new(hash, size_bytes))
    }
}

/// The ByteStream resource name for a full read of `digest` within `instance_name`.
pub fn resource_name(instance_name: &str, digest: &Digest) -> String {
    format!(
        "{}/blobs/{}/{}",
        instance_name, digest.hash, digest.size_bytes
    )
}

/// A parsed `<instance>/blobs/<hash>/<size>` read resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadResource {
    pub instance_name: InstanceName,
    pub digest: Digest,
}

impl ReadResource {
    pub fn parse(name: &str) -> Result<Self> {
        let invalid = || Error::InvalidResourceName(name.to_string());

        let mut parts = name.rsplitn(3, '/');
        let size = parts.next().ok_or_else(invalid)?;
        let hash = parts.next().ok_or_else(invalid)?;
        let prefix = parts.next().ok_or_else(invalid)?;

        // the instance name may be empty, and may itself contain slashes
        let instance_name = prefix.strip_suffix("/blobs").ok_or_else(invalid)?;
        if hash.is_empty() {
            return Err(invalid());
        }
        let size_bytes = size.parse::<u64>().map_err(|_| invalid())?;

        Ok(Self {
            instance_name: instance_name.to_string(),
            digest: Digest::new(hash, size_bytes),
        })
    }
}

impl fmt::Display for ReadResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&resource_name(&self.instance_name, &self.digest))
    }
}

/// A file produced by a remote action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    pub digest: Digest,
    pub is_executable: bool,
}

impl TryFrom<proto::OutputFile> for OutputFile {
    type Error = Error;

    fn try_from(file: proto::OutputFile) -> Result<Self> {
        Ok(Self {
            path: file.path,
            digest: Digest::from_wire(file.digest)?,
            is_executable: file.is_executable,
        })
    }
}

/// A directory produced by a remote action, addressed by the digest of its `Tree`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputDirectory {
    pub path: String,
    pub tree_digest: Digest,
}

impl TryFrom<proto::OutputDirectory> for OutputDirectory {
    type Error = Error;

    fn try_from(dir: proto::OutputDirectory) -> Result<Self> {
        Ok(Self {
            path: dir.path,
            tree_digest: Digest::from_wire(dir.tree_digest)?,
        })
    }
}
