//! Write cursor into the metadata tree being assembled.

use super::error::ParseError;
use super::types::{Metadata, MetadataMap, SectionInfo, Side, StreamInfo};

/// Where classified lines are currently written.
///
/// Starts `Detached`, moves to `Section` on an `Input`/`Output` header and
/// to `Stream` once that section declares a stream. Writing through a
/// detached cursor fails with [`ParseError::NoSection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Detached,
    Section(Side),
    Stream { side: Side, index: usize },
}

impl Cursor {
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Detached => None,
            Self::Section(side) | Self::Stream { side, .. } => Some(*side),
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Self::Detached)
    }

    /// Section the cursor belongs to.
    pub fn section_mut<'m>(&self, metadata: &'m mut Metadata) -> Result<&'m mut SectionInfo, ParseError> {
        let side = self.side().ok_or(ParseError::NoSection)?;
        Ok(metadata.section_mut(side))
    }

    /// Stream the cursor points at, if it points at one.
    pub fn stream_mut<'m>(
        &self,
        metadata: &'m mut Metadata,
    ) -> Result<Option<&'m mut StreamInfo>, ParseError> {
        match *self {
            Self::Detached => Err(ParseError::NoSection),
            Self::Section(_) => Ok(None),
            Self::Stream { side, index } => metadata
                .section_mut(side)
                .streams
                .get_mut(index)
                .map(Some)
                .ok_or(ParseError::MissingStream { index }),
        }
    }

    /// Appends `stream` to the current section and moves onto it.
    pub fn push_stream(&mut self, metadata: &mut Metadata, stream: StreamInfo) -> Result<(), ParseError> {
        let side = self.side().ok_or(ParseError::NoSection)?;
        let streams = &mut metadata.section_mut(side).streams;
        streams.push(stream);
        *self = Self::Stream {
            side,
            index: streams.len() - 1,
        };
        Ok(())
    }

    /// Opens an empty metadata block on the current stream, or on the
    /// section when no stream has been declared yet.
    pub fn open_metadata_block(&self, metadata: &mut Metadata) -> Result<(), ParseError> {
        match self.stream_mut(metadata)? {
            Some(stream) => stream.metadata = Some(MetadataMap::new()),
            None => self.section_mut(metadata)?.metadata = Some(MetadataMap::new()),
        }
        Ok(())
    }

    /// Metadata block that free-form `key: value` lines should land in.
    ///
    /// The current stream's block wins when it has one; otherwise the
    /// section's block is used. `None` means no block is open.
    pub fn metadata_target_mut<'m>(
        &self,
        metadata: &'m mut Metadata,
    ) -> Result<Option<&'m mut MetadataMap>, ParseError> {
        let section = self.section_mut(metadata)?;
        if let Self::Stream { index, .. } = *self {
            let stream_has_block = section
                .streams
                .get(index)
                .ok_or(ParseError::MissingStream { index })?
                .metadata
                .is_some();
            if stream_has_block {
                return Ok(section.streams[index].metadata.as_mut());
            }
        }
        Ok(section.metadata.as_mut())
    }
}
