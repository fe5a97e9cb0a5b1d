//! Decoding of PDF image XObject streams into pixels.

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Document, Object, Stream};

/// Colour spaces whose samples can be written out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
}

impl ColourSpace {
    pub fn components(self) -> usize {
        match self {
            ColourSpace::Gray => 1,
            ColourSpace::Rgb => 3,
            ColourSpace::Cmyk => 4,
        }
    }

    fn from_components(components: i64) -> Option<Self> {
        match components {
            1 => Some(ColourSpace::Gray),
            3 => Some(ColourSpace::Rgb),
            4 => Some(ColourSpace::Cmyk),
            _ => None,
        }
    }
}

/// Result of decoding an image stream.
#[derive(Debug)]
pub enum Decoded {
    Image(DynamicImage),
    /// The stream uses an encoding or colour space that is not handled.
    Unsupported(String),
}

/// Converts a CMYK sample to RGB by subtracting ink from white.
pub fn cmyk_to_rgb([c, m, y, k]: [u8; 4]) -> [u8; 3] {
    let channel = |ink: u8| 255 - (u16::from(ink) + u16::from(k)).min(255) as u8;
    [channel(c), channel(m), channel(y)]
}

/// How an image's samples map to colours.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageColour {
    Direct(ColourSpace),
    /// Samples index into `palette`, which holds one entry of `base` samples
    /// per colour.
    Indexed {
        base: ColourSpace,
        palette: Vec<u8>,
    },
}

/// Raw sample buffer with a known layout.
struct Samples {
    width: u32,
    height: u32,
    colour_space: ColourSpace,
    data: Vec<u8>,
}

impl Samples {
    fn into_image(mut self) -> Result<DynamicImage> {
        let pixel_count = self.width as usize * self.height as usize;
        let expected = pixel_count * self.colour_space.components();
        if self.data.len() < expected {
            return Err(anyhow!(
                "image data has {} bytes, expected {} for {}x{} {:?}",
                self.data.len(),
                expected,
                self.width,
                self.height,
                self.colour_space,
            ));
        }
        self.data.truncate(expected);

        let image = match self.colour_space {
            ColourSpace::Gray => GrayImage::from_raw(self.width, self.height, self.data)
                .map(DynamicImage::ImageLuma8),
            ColourSpace::Rgb => RgbImage::from_raw(self.width, self.height, self.data)
                .map(DynamicImage::ImageRgb8),
            ColourSpace::Cmyk => {
                let rgb: Vec<u8> = self
                    .data
                    .chunks_exact(4)
                    .flat_map(|cmyk| cmyk_to_rgb([cmyk[0], cmyk[1], cmyk[2], cmyk[3]]))
                    .collect();
                RgbImage::from_raw(self.width, self.height, rgb).map(DynamicImage::ImageRgb8)
            }
        };
        image.ok_or_else(|| anyhow!("image buffer does not match its dimensions"))
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Names of the filters applied to a stream's data, in decoding order.
fn filters_of(doc: &Document, stream: &Stream) -> Result<Vec<Vec<u8>>> {
    let Ok(filter) = stream.dict.get(b"Filter") else {
        return Ok(Vec::new());
    };
    match resolve(doc, filter)? {
        Object::Name(name) => Ok(vec![name.clone()]),
        Object::Array(filters) => filters
            .iter()
            .map(|filter| Ok(resolve(doc, filter)?.as_name()?.to_vec()))
            .collect(),
        other => Err(anyhow!("unexpected /Filter value {:?}", other)),
    }
}

fn is_compression(filter: &[u8]) -> bool {
    matches!(filter, b"FlateDecode" | b"LZWDecode")
}

/// Undoes the Flate and LZW `filters` of `stream`.
fn decompress(stream: &Stream, filters: &[Vec<u8>]) -> Result<Vec<u8>> {
    if filters.is_empty() {
        return Ok(stream.content.clone());
    }
    // lopdf declines to decompress streams with an image subtype.
    let mut dict = stream.dict.clone();
    dict.remove(b"Subtype");
    dict.set(
        "Filter",
        filters
            .iter()
            .map(|filter| Object::Name(filter.clone()))
            .collect::<Vec<_>>(),
    );
    Ok(Stream::new(dict, stream.content.clone()).decompressed_content()?)
}

/// Determines the colour space named by an image's `/ColorSpace` entry.
pub fn colour_space_of(doc: &Document, colour_space: &Object) -> Result<Option<ColourSpace>> {
    match resolve(doc, colour_space)? {
        Object::Name(name) => Ok(match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(ColourSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColourSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColourSpace::Cmyk),
            _ => None,
        }),
        Object::Array(parts) => {
            let Some(family) = parts.first() else {
                return Ok(None);
            };
            match resolve(doc, family)?.as_name()? {
                b"ICCBased" => {
                    let profile = parts
                        .get(1)
                        .ok_or_else(|| anyhow!("ICCBased colour space without a profile"))?;
                    let components = resolve(doc, profile)?
                        .as_stream()?
                        .dict
                        .get(b"N")?
                        .as_i64()?;
                    Ok(ColourSpace::from_components(components))
                }
                b"CalGray" => Ok(Some(ColourSpace::Gray)),
                b"CalRGB" => Ok(Some(ColourSpace::Rgb)),
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

/// Determines how the samples of an image with the given `/ColorSpace` map to
/// colours, including `[/Indexed base hival lookup]` palettes.
pub fn image_colour_of(doc: &Document, colour_space: &Object) -> Result<Option<ImageColour>> {
    if let Object::Array(parts) = resolve(doc, colour_space)? {
        if let [family, base, hival, lookup] = parts.as_slice() {
            if matches!(resolve(doc, family)?.as_name()?, b"Indexed" | b"I") {
                let Some(base) = colour_space_of(doc, base)? else {
                    return Ok(None);
                };
                let hival = resolve(doc, hival)?.as_i64()?;
                let entries = usize::try_from(hival)
                    .ok()
                    .filter(|hival| *hival < 256)
                    .ok_or_else(|| anyhow!("invalid indexed colour hival {}", hival))?
                    + 1;
                let mut palette = match resolve(doc, lookup)? {
                    Object::String(bytes, _) => bytes.clone(),
                    Object::Stream(stream) => decompress(stream, &filters_of(doc, stream)?)
                        .context("decompressing indexed colour lookup table")?,
                    other => return Err(anyhow!("unexpected indexed colour lookup {:?}", other)),
                };
                palette.resize(entries * base.components(), 0);
                return Ok(Some(ImageColour::Indexed { base, palette }));
            }
        }
    }
    Ok(colour_space_of(doc, colour_space)?.map(ImageColour::Direct))
}

/// Splits rows of packed `bits`-wide samples, each row padded to a whole
/// byte, into one value per sample.
fn unpack_samples(data: &[u8], samples_per_row: usize, rows: usize, bits: u8) -> Vec<u16> {
    let bits = usize::from(bits);
    let row_bytes = (samples_per_row * bits).div_ceil(8);
    let mask = (1u16 << bits.min(15)) - 1;
    let mut out = Vec::with_capacity(samples_per_row * rows);
    for row in data.chunks(row_bytes).take(rows) {
        match bits {
            8 => out.extend(row.iter().take(samples_per_row).map(|&byte| u16::from(byte))),
            16 => out.extend(
                row.chunks_exact(2)
                    .take(samples_per_row)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
            ),
            _ => out.extend((0..samples_per_row).map(|i| {
                let offset = i * bits;
                let shift = 8 - bits - offset % 8;
                row.get(offset / 8)
                    .map_or(0, |byte| (u16::from(*byte) >> shift) & mask)
            })),
        }
    }
    out
}

/// Scales a `bits`-wide sample to the 0..=255 range.
fn to_eight_bits(value: u16, bits: u8) -> u8 {
    match bits {
        16 => (value >> 8) as u8,
        8 => value as u8,
        _ => (u32::from(value) * 255 / ((1u32 << bits) - 1)) as u8,
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> Result<u32> {
    let value = stream.dict.get(key)?.as_i64()?;
    u32::try_from(value).with_context(|| {
        format!(
            "invalid image {} {}",
            String::from_utf8_lossy(key),
            value
        )
    })
}

/// Decodes an image XObject stream.
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<Decoded> {
    if let Ok(mask) = stream.dict.get(b"ImageMask") {
        if mask.as_bool().unwrap_or(false) {
            return Ok(Decoded::Unsupported("stencil mask".to_string()));
        }
    }

    let filters = filters_of(doc, stream)?;
    let (compression, image_filter) = match filters.split_last() {
        Some((last, rest)) if !is_compression(last) => (rest, Some(last.as_slice())),
        _ => (filters.as_slice(), None),
    };
    if let Some(other) = compression.iter().find(|filter| !is_compression(filter)) {
        return Ok(Decoded::Unsupported(format!(
            "filter {} before the last",
            String::from_utf8_lossy(other)
        )));
    }
    let raw = decompress(stream, compression).context("decompressing image data")?;

    match image_filter {
        None => {}
        Some(b"DCTDecode") => {
            let image = image::load_from_memory_with_format(&raw, ImageFormat::Jpeg)
                .context("decoding JPEG image data")?;
            return Ok(Decoded::Image(image));
        }
        Some(other) => {
            return Ok(Decoded::Unsupported(format!(
                "filter {}",
                String::from_utf8_lossy(other)
            )));
        }
    }

    let width = dimension(stream, b"Width")?;
    let height = dimension(stream, b"Height")?;
    let colour = match stream.dict.get(b"ColorSpace") {
        Ok(object) => image_colour_of(doc, object)?,
        Err(_) => None,
    };
    let Some(colour) = colour else {
        return Ok(Decoded::Unsupported("colour space".to_string()));
    };
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    let bits = match (&colour, u8::try_from(bits)) {
        (ImageColour::Direct(_), Ok(bits @ (1 | 2 | 4 | 8 | 16))) => bits,
        (ImageColour::Indexed { .. }, Ok(bits @ (1 | 2 | 4 | 8))) => bits,
        _ => {
            return Ok(Decoded::Unsupported(format!(
                "{} bits per component in {:?}",
                bits, colour
            )));
        }
    };

    let samples_per_pixel = match &colour {
        ImageColour::Direct(colour_space) => colour_space.components(),
        ImageColour::Indexed { .. } => 1,
    };
    let samples_per_row = width as usize * samples_per_pixel;
    let expected = (samples_per_row * usize::from(bits)).div_ceil(8) * height as usize;
    if raw.len() < expected {
        return Err(anyhow!(
            "image data has {} bytes, expected {} for {}x{} {:?}",
            raw.len(),
            expected,
            width,
            height,
            colour,
        ));
    }
    let values = unpack_samples(&raw, samples_per_row, height as usize, bits);

    let (colour_space, data): (ColourSpace, Vec<u8>) = match colour {
        ImageColour::Direct(colour_space) => (
            colour_space,
            values
                .into_iter()
                .map(|value| to_eight_bits(value, bits))
                .collect(),
        ),
        ImageColour::Indexed { base, palette } => {
            let components = base.components();
            let last_entry = palette.len() / components - 1;
            let data = values
                .into_iter()
                .flat_map(|index| {
                    let start = usize::from(index).min(last_entry) * components;
                    palette[start..start + components].iter().copied()
                })
                .collect();
            (base, data)
        }
    };

    Samples {
        width,
        height,
        colour_space,
        data,
    }
    .into_image()
    .map(Decoded::Image)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use anyhow::Result;
    use googletest::prelude::*;
    use lopdf::dictionary;
    use test_casing::test_casing;

    use super::*;

    const CMYK_CASES: [([u8; 4], [u8; 3]); 5] = [
        ([0, 0, 0, 0], [255, 255, 255]),
        ([0, 0, 0, 255], [0, 0, 0]),
        ([255, 0, 0, 0], [0, 255, 255]),
        ([100, 50, 0, 100], [55, 105, 155]),
        ([200, 0, 0, 100], [0, 155, 155]),
    ];

    #[test_casing(5, CMYK_CASES)]
    fn converts_cmyk_to_rgb(cmyk: [u8; 4], rgb: [u8; 3]) {
        assert_that!(cmyk_to_rgb(cmyk), eq(rgb));
    }

    fn image_stream(mut dict: lopdf::Dictionary, data: Vec<u8>) -> Stream {
        dict.set("Type", "XObject");
        dict.set("Subtype", "Image");
        Stream::new(dict, data)
    }

    fn expect_image(decoded: Decoded) -> Result<DynamicImage> {
        match decoded {
            Decoded::Image(image) => Ok(image),
            Decoded::Unsupported(reason) => Err(anyhow!("unexpectedly unsupported: {reason}")),
        }
    }

    #[gtest]
    fn classifies_named_colour_spaces() -> Result<()> {
        let doc = Document::with_version("1.5");
        for (name, expected) in [
            ("DeviceGray", Some(ColourSpace::Gray)),
            ("DeviceRGB", Some(ColourSpace::Rgb)),
            ("DeviceCMYK", Some(ColourSpace::Cmyk)),
            ("Pattern", None),
        ] {
            expect_that!(
                colour_space_of(&doc, &Object::Name(name.as_bytes().to_vec()))?,
                eq(expected)
            );
        }
        Ok(())
    }

    #[gtest]
    fn classifies_icc_based_by_component_count() -> Result<()> {
        let mut doc = Document::with_version("1.5");
        for (components, expected) in [
            (1, Some(ColourSpace::Gray)),
            (3, Some(ColourSpace::Rgb)),
            (4, Some(ColourSpace::Cmyk)),
            (2, None),
        ] {
            let profile = doc.add_object(Stream::new(dictionary! { "N" => components }, vec![]));
            let colour_space = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), profile.into()]);
            expect_that!(colour_space_of(&doc, &colour_space)?, eq(expected));
        }
        Ok(())
    }

    fn indexed(base: &str, hival: i64, lookup: Object) -> Object {
        Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            Object::Name(base.as_bytes().to_vec()),
            hival.into(),
            lookup,
        ])
    }

    #[gtest]
    fn indexed_colour_carries_padded_palette() -> Result<()> {
        let mut doc = Document::with_version("1.5");
        let lookup = doc.add_object(Stream::new(lopdf::Dictionary::new(), vec![9, 8, 7]));

        expect_that!(
            colour_space_of(&doc, &indexed("DeviceRGB", 1, lookup.into()))?,
            none()
        );
        expect_that!(
            image_colour_of(&doc, &indexed("DeviceRGB", 1, lookup.into()))?,
            some(eq(&ImageColour::Indexed {
                base: ColourSpace::Rgb,
                palette: vec![9, 8, 7, 0, 0, 0],
            }))
        );
        expect_that!(
            image_colour_of(&doc, &Object::Name(b"DeviceGray".to_vec()))?,
            some(eq(&ImageColour::Direct(ColourSpace::Gray)))
        );
        expect_that!(
            image_colour_of(&doc, &indexed("Pattern", 1, Object::string_literal(vec![0u8; 2])))?,
            none()
        );
        Ok(())
    }

    #[gtest]
    fn maps_indexed_samples_through_palette() -> Result<()> {
        let doc = Document::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => indexed(
                    "DeviceRGB",
                    1,
                    Object::string_literal(vec![0, 0, 0, 255, 255, 255]),
                ),
                "BitsPerComponent" => 8,
            },
            vec![1, 0],
        );

        let image = expect_image(decode_image(&doc, &stream)?)?.into_rgb8();

        expect_that!(image.get_pixel(0, 0).0, eq([255, 255, 255]));
        expect_that!(image.get_pixel(1, 0).0, eq([0, 0, 0]));
        Ok(())
    }

    #[gtest]
    fn maps_packed_indexed_cmyk_samples_and_clamps_to_hival() -> Result<()> {
        let doc = Document::with_version("1.5");
        // Three 2-bit indices per row; 3 is beyond hival and uses entry 1.
        let stream = image_stream(
            dictionary! {
                "Width" => 3,
                "Height" => 1,
                "ColorSpace" => indexed(
                    "DeviceCMYK",
                    1,
                    Object::string_literal(vec![0, 0, 0, 0, 0, 0, 0, 255]),
                ),
                "BitsPerComponent" => 2,
            },
            vec![0b0001_1100],
        );

        let image = expect_image(decode_image(&doc, &stream)?)?.into_rgb8();

        expect_that!(image.get_pixel(0, 0).0, eq([255, 255, 255]));
        expect_that!(image.get_pixel(1, 0).0, eq([0, 0, 0]));
        expect_that!(image.get_pixel(2, 0).0, eq([0, 0, 0]));
        Ok(())
    }

    const PACKED_GRAY_CASES: [(i64, &[u8], [u8; 3]); 4] = [
        (2, &[0b0001_1000], [0, 85, 170]),
        (4, &[0x0F, 0x70], [0, 255, 119]),
        (8, &[1, 2, 3], [1, 2, 3]),
        (16, &[0xAB, 0xCD, 0x00, 0xFF, 0xFF, 0x00], [0xAB, 0x00, 0xFF]),
    ];

    #[test_casing(4, PACKED_GRAY_CASES)]
    fn scales_gray_samples_to_eight_bits(bits: i64, data: &[u8], expected: [u8; 3]) {
        let doc = Document::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 3,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => bits,
            },
            data.to_vec(),
        );

        let samples = decode_image(&doc, &stream)
            .and_then(expect_image)
            .map(|image| image.into_luma8().into_raw());

        assert_that!(samples, ok(eq(&expected.to_vec())));
    }

    #[gtest]
    fn decompresses_flate_image_data() -> Result<()> {
        let doc = Document::with_version("1.5");
        let mut stream = image_stream(
            dictionary! {
                "Width" => 64,
                "Height" => 64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![200; 64 * 64],
        );
        stream.compress()?;
        expect_that!(stream.dict.get(b"Filter")?.as_name()?, eq(b"FlateDecode"));

        let image = expect_image(decode_image(&doc, &stream)?)?.into_luma8();

        expect_that!(image.dimensions(), eq((64, 64)));
        expect_true!(image.pixels().all(|pixel| pixel.0 == [200]));
        Ok(())
    }

    #[gtest]
    fn decodes_raw_cmyk_as_rgb() -> Result<()> {
        let doc = Document::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => "DeviceCMYK",
                "BitsPerComponent" => 8,
            },
            vec![0, 0, 0, 0, 0, 0, 0, 255],
        );

        let image = expect_image(decode_image(&doc, &stream)?)?.into_rgb8();

        expect_that!(image.get_pixel(0, 0).0, eq([255, 255, 255]));
        expect_that!(image.get_pixel(1, 0).0, eq([0, 0, 0]));
        Ok(())
    }

    #[gtest]
    fn decodes_raw_gray_directly() -> Result<()> {
        let doc = Document::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 3,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 128, 255],
        );

        let image = expect_image(decode_image(&doc, &stream)?)?;

        expect_that!(image.color(), eq(image::ColorType::L8));
        expect_that!(image.into_luma8().into_raw(), eq(&vec![0, 128, 255]));
        Ok(())
    }

    #[gtest]
    fn expands_one_bit_gray() -> Result<()> {
        let doc = Document::with_version("1.5");
        // Two rows of 3 pixels, each padded to a byte.
        let stream = image_stream(
            dictionary! {
                "Width" => 3,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 1,
            },
            vec![0b1010_0000, 0b0110_0000],
        );

        let image = expect_image(decode_image(&doc, &stream)?)?.into_luma8();

        expect_that!(image.into_raw(), eq(&vec![255, 0, 255, 0, 255, 255]));
        Ok(())
    }

    #[gtest]
    fn decodes_dct_streams_as_jpeg() -> Result<()> {
        let doc = Document::with_version("1.5");
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 2, image::Rgb([200, 100, 50])))
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)?;
        let stream = image_stream(
            dictionary! {
                "Width" => 4,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );

        let image = expect_image(decode_image(&doc, &stream)?)?;

        expect_that!((image.width(), image.height()), eq((4, 2)));
        Ok(())
    }

    #[gtest]
    fn reports_unsupported_encodings() -> Result<()> {
        let doc = Document::with_version("1.5");
        let jpx = image_stream(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "Filter" => "JPXDecode",
            },
            vec![0],
        );
        let mask = image_stream(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ImageMask" => true,
            },
            vec![0],
        );
        let sixteen_bit_indexed = image_stream(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => indexed("DeviceGray", 0, Object::string_literal(vec![0u8])),
                "BitsPerComponent" => 16,
            },
            vec![0; 2],
        );
        let jpx_after_flate = image_stream(
            dictionary! {
                "Width" => 1,
                "Height" => 1,
                "Filter" => vec![Object::from("JPXDecode"), Object::from("FlateDecode")],
            },
            vec![0],
        );

        for stream in [jpx, mask, sixteen_bit_indexed, jpx_after_flate] {
            expect_true!(matches!(
                decode_image(&doc, &stream)?,
                Decoded::Unsupported(_)
            ));
        }
        Ok(())
    }

    #[gtest]
    fn short_sample_data_is_an_error() {
        let doc = Document::with_version("1.5");
        let stream = image_stream(
            dictionary! {
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![0; 5],
        );

        expect_that!(
            decode_image(&doc, &stream),
            err(displays_as(contains_substring("expected 12")))
        );
    }
}
