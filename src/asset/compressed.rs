//! Imported texture blobs: a little-endian header
//! `{format: i32, width: u32, height: u32, data_size: u32}` followed by
//! `data_size` bytes of already encoded texel data.

use super::ContentError;

pub const HEADER_SIZE: usize = 16;

const GL_COMPRESSED_RGB_S3TC_DXT1: i32 = 0x83F0;
const GL_COMPRESSED_RGBA_S3TC_DXT1: i32 = 0x83F1;
const GL_COMPRESSED_RGBA_S3TC_DXT3: i32 = 0x83F2;
const GL_COMPRESSED_RGBA_S3TC_DXT5: i32 = 0x83F3;
const GL_RGBA8: i32 = 0x8058;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    /// Device format code as stored in the blob.
    pub format: i32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl CompressedImage {
    pub fn parse(bytes: &[u8]) -> Result<Self, ContentError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ContentError::TruncatedBlob {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];
        let format = i32::from_le_bytes(word(0));
        let width = u32::from_le_bytes(word(4));
        let height = u32::from_le_bytes(word(8));
        let data_size = u32::from_le_bytes(word(12)) as usize;

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() < data_size {
            return Err(ContentError::TruncatedBlob {
                expected: HEADER_SIZE + data_size,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            format,
            width,
            height,
            data: payload[..data_size].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.data.len());
        bytes.extend_from_slice(&self.format.to_le_bytes());
        bytes.extend_from_slice(&self.width.to_le_bytes());
        bytes.extend_from_slice(&self.height.to_le_bytes());
        bytes.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&self.data);
        bytes
    }

    pub fn texture_format(&self) -> Result<wgpu::TextureFormat, ContentError> {
        match self.format {
            GL_COMPRESSED_RGB_S3TC_DXT1 | GL_COMPRESSED_RGBA_S3TC_DXT1 => {
                Ok(wgpu::TextureFormat::Bc1RgbaUnorm)
            }
            GL_COMPRESSED_RGBA_S3TC_DXT3 => Ok(wgpu::TextureFormat::Bc2RgbaUnorm),
            GL_COMPRESSED_RGBA_S3TC_DXT5 => Ok(wgpu::TextureFormat::Bc3RgbaUnorm),
            GL_RGBA8 => Ok(wgpu::TextureFormat::Rgba8Unorm),
            other => Err(ContentError::UnsupportedTextureFormat(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxt5_blob() -> Vec<u8> {
        CompressedImage {
            format: GL_COMPRESSED_RGBA_S3TC_DXT5,
            width: 4,
            height: 4,
            data: vec![0xAB; 16],
        }
        .to_bytes()
    }

    #[test]
    fn header_is_little_endian() {
        let bytes = dxt5_blob();
        assert_eq!(&bytes[0..4], &[0xF3, 0x83, 0, 0]);
        assert_eq!(&bytes[12..16], &[16, 0, 0, 0]);

        let image = CompressedImage::parse(&bytes).unwrap();
        assert_eq!((image.width, image.height), (4, 4));
        assert_eq!(
            image.texture_format().unwrap(),
            wgpu::TextureFormat::Bc3RgbaUnorm
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = dxt5_blob();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(CompressedImage::parse(&bytes).unwrap().data.len(), 16);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = dxt5_blob();
        let err = CompressedImage::parse(&bytes[..20]).unwrap_err();
        assert!(matches!(
            err,
            ContentError::TruncatedBlob {
                expected: 32,
                actual: 20
            }
        ));
        assert!(matches!(
            CompressedImage::parse(&bytes[..3]),
            Err(ContentError::TruncatedBlob { .. })
        ));
    }

    #[test]
    fn unknown_format_is_an_error() {
        let image = CompressedImage {
            format: 0x1234,
            width: 1,
            height: 1,
            data: vec![],
        };
        assert!(matches!(
            image.texture_format(),
            Err(ContentError::UnsupportedTextureFormat(0x1234))
        ));
    }
}
