//! QR code encoding functionality.
//!
//! This module turns text into a QR Code Model 2 symbol: a square grid of dark and light modules.
//! It covers versions 1 to 40, all four error correction levels and the numeric, alphanumeric and
//! byte segment modes. Symbols own their module storage, so a finished [`QrCode`] can be handed to
//! any renderer without juggling scratch buffers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A QR Code symbol, representing a square grid of dark and light modules.
///
/// Instances are immutable after creation. Use [`QrCode::encode_text`] for the common case or
/// [`QrCode::encode_segments`] when the version range, mask or ECC boosting must be controlled.
///
/// # Example
///
/// ```rust
/// use peakbook_qr::qrcode::{QrCode, QrCodeEcc};
///
/// let qr = QrCode::encode_text("https://peakbook.app/scan?token=ABCDEFGHIJ0123456789", QrCodeEcc::Quartile).unwrap();
/// assert_eq!(qr.size(), 37);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrCode {
    version: Version,
    /// Width and height in modules, between 21 and 177 (inclusive).
    size: i32,
    ecl: QrCodeEcc,
    mask: Mask,
    /// Row-major module colors (true = dark).
    modules: Vec<bool>,
    /// Marks finder, timing, alignment, format and version modules while drawing.
    is_function: Vec<bool>,
}

impl QrCode {
    /// Encodes a text string at exactly the requested error correction level.
    ///
    /// The smallest version that can hold the data is chosen and the mask is picked automatically.
    ///
    /// # Errors
    ///
    /// Returns [`DataTooLong`] when the text does not fit in a version 40 symbol at `ecl`.
    pub fn encode_text(text: &str, ecl: QrCodeEcc) -> Result<Self, DataTooLong> {
        let segs = QrSegment::make_segments(text);
        QrCode::encode_segments(&segs, ecl, Version::MIN, Version::MAX, None, false)
    }

    /// Encodes the given segments into a symbol.
    ///
    /// The smallest version within `minversion..=maxversion` that fits is used. If `boostecl` is
    /// `true` the ECC level may be raised when that does not increase the version. A `mask` of
    /// `None` selects the pattern with the lowest penalty score.
    ///
    /// # Errors
    ///
    /// Returns [`DataTooLong`] when the segments do not fit in `maxversion`.
    pub fn encode_segments(
        segs: &[QrSegment],
        mut ecl: QrCodeEcc,
        minversion: Version,
        maxversion: Version,
        mask: Option<Mask>,
        boostecl: bool,
    ) -> Result<Self, DataTooLong> {
        assert!(minversion <= maxversion, "Invalid version range");

        // Find the minimal version number to use
        let mut version: Version = minversion;
        let datausedbits: usize = loop {
            let datacapacitybits: usize = QrCode::num_data_codewords(version, ecl) * 8;
            let dataused: Option<usize> = QrSegment::total_bits(segs, version);
            if let Some(n) = dataused {
                if n <= datacapacitybits {
                    break n;
                }
            }
            if version >= maxversion {
                return Err(match dataused {
                    None => DataTooLong::SegmentTooLong,
                    Some(n) => DataTooLong::DataOverCapacity(n, datacapacitybits),
                });
            }
            version = Version::new(version.value() + 1);
        };

        for &newecl in &[QrCodeEcc::Medium, QrCodeEcc::Quartile, QrCodeEcc::High] {
            if boostecl && datausedbits <= QrCode::num_data_codewords(version, newecl) * 8 {
                ecl = newecl;
            }
        }

        // Concatenate all segments to create the data bit string
        let datacapacitybits: usize = QrCode::num_data_codewords(version, ecl) * 8;
        let mut bb = BitBuffer(Vec::with_capacity(datacapacitybits));
        for seg in segs {
            bb.append_bits(seg.mode.mode_bits(), 4);
            // total_bits() already rejected counts that overflow the count field
            bb.append_bits(seg.numchars as u32, seg.mode.num_char_count_bits(version));
            bb.0.extend_from_slice(&seg.data);
        }
        debug_assert_eq!(bb.0.len(), datausedbits);

        // Add terminator and pad up to a byte if applicable
        let numzerobits: usize = core::cmp::min(4, datacapacitybits - bb.0.len());
        bb.append_bits(0, numzerobits as u8);
        let numzerobits: usize = bb.0.len().wrapping_neg() & 7;
        bb.append_bits(0, numzerobits as u8);
        debug_assert_eq!(bb.0.len() % 8, 0);

        // Pad with alternating bytes until data capacity is reached
        for &padbyte in [0xec, 0x11].iter().cycle() {
            if bb.0.len() >= datacapacitybits {
                break;
            }
            bb.append_bits(padbyte, 8);
        }

        let mut datacodewords = vec![0u8; bb.0.len() / 8];
        for (i, &bit) in bb.0.iter().enumerate() {
            datacodewords[i >> 3] |= u8::from(bit) << (7 - (i & 7));
        }
        Ok(QrCode::encode_codewords(version, ecl, &datacodewords, mask))
    }

    /// Builds a symbol from already padded data codewords.
    ///
    /// This is the low-level entry point; `datacodewords` must be exactly as long as the data
    /// capacity of `version` at `ecl`.
    pub fn encode_codewords(
        version: Version,
        ecl: QrCodeEcc,
        datacodewords: &[u8],
        msk: Option<Mask>,
    ) -> Self {
        let size = usize::from(version.value()) * 4 + 17;
        let mut result = Self {
            version,
            size: size as i32,
            ecl,
            mask: Mask::new(0),
            modules: vec![false; size * size],
            is_function: vec![false; size * size],
        };

        result.draw_function_patterns();
        let allcodewords: Vec<u8> = result.add_ecc_and_interleave(datacodewords);
        result.draw_codewords(&allcodewords);

        let mask: Mask = match msk {
            Some(mask) => mask,
            None => {
                let mut best = Mask::new(0);
                let mut minpenalty = i32::MAX;
                for i in 0u8..8 {
                    let candidate = Mask::new(i);
                    result.apply_mask(candidate);
                    result.draw_format_bits(candidate);
                    let penalty: i32 = result.penalty_score();
                    if penalty < minpenalty {
                        best = candidate;
                        minpenalty = penalty;
                    }
                    result.apply_mask(candidate); // Undoes the mask due to XOR
                }
                best
            }
        };
        result.mask = mask;
        result.apply_mask(mask);
        result.draw_format_bits(mask);
        result.is_function = Vec::new();
        result
    }

    /// Returns this QR Code's version, in the range [1, 40].
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns this QR Code's size in modules, in the range [21, 177].
    pub fn size(&self) -> i32 {
        self.size
    }

    /// Returns this QR Code's error correction level.
    pub fn error_correction_level(&self) -> QrCodeEcc {
        self.ecl
    }

    /// Returns this QR Code's mask, in the range [0, 7].
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns the color of the module at the given coordinates.
    ///
    /// Returns `true` for dark modules. Coordinates outside the symbol are light.
    pub fn get_module(&self, x: i32, y: i32) -> bool {
        let range = 0..self.size;
        range.contains(&x) && range.contains(&y) && self.module(x, y)
    }

    /// Returns `true` when (x, y) lies in one of the three 7x7 finder patterns.
    pub fn is_finder(&self, x: i32, y: i32) -> bool {
        let far = self.size - 7;
        (x < 7 && y < 7) || (x >= far && y < 7) || (x < 7 && y >= far)
    }

    /// Number of dark modules in the whole symbol.
    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|&&dark| dark).count()
    }

    fn module(&self, x: i32, y: i32) -> bool {
        self.modules[(y * self.size + x) as usize]
    }

    fn set_function_module(&mut self, x: i32, y: i32, isdark: bool) {
        let index = (y * self.size + x) as usize;
        self.modules[index] = isdark;
        self.is_function[index] = true;
    }

    /*---- Drawing function modules ----*/

    fn draw_function_patterns(&mut self) {
        let size: i32 = self.size;
        for i in 0..size {
            self.set_function_module(6, i, i % 2 == 0);
            self.set_function_module(i, 6, i % 2 == 0);
        }

        self.draw_finder_pattern(3, 3);
        self.draw_finder_pattern(size - 4, 3);
        self.draw_finder_pattern(3, size - 4);

        let alignpatpos: Vec<i32> = self.alignment_pattern_positions();
        let numalign: usize = alignpatpos.len();
        for i in 0..numalign {
            for j in 0..numalign {
                // Skip the three corners occupied by finder patterns
                if !((i == 0 && j == 0) || (i == 0 && j == numalign - 1) || (i == numalign - 1 && j == 0)) {
                    self.draw_alignment_pattern(alignpatpos[i], alignpatpos[j]);
                }
            }
        }

        // Reserved now, overwritten once the mask is known
        self.draw_format_bits(Mask::new(0));
        self.draw_version();
    }

    fn draw_format_bits(&mut self, mask: Mask) {
        let bits: u32 = {
            let data = u32::from((self.ecl.format_bits() << 3) | mask.value());
            let mut rem: u32 = data;
            for _ in 0..10 {
                rem = (rem << 1) ^ ((rem >> 9) * 0x537);
            }
            ((data << 10) | rem) ^ 0x5412
        };
        debug_assert_eq!(bits >> 15, 0);

        // First copy
        for i in 0..6 {
            self.set_function_module(8, i, get_bit(bits, i));
        }
        self.set_function_module(8, 7, get_bit(bits, 6));
        self.set_function_module(8, 8, get_bit(bits, 7));
        self.set_function_module(7, 8, get_bit(bits, 8));
        for i in 9..15 {
            self.set_function_module(14 - i, 8, get_bit(bits, i));
        }

        // Second copy
        let size: i32 = self.size;
        for i in 0..8 {
            self.set_function_module(size - 1 - i, 8, get_bit(bits, i));
        }
        for i in 8..15 {
            self.set_function_module(8, size - 15 + i, get_bit(bits, i));
        }
        self.set_function_module(8, size - 8, true); // Always dark
    }

    fn draw_version(&mut self) {
        let ver = u32::from(self.version.value());
        if ver < 7 {
            return;
        }
        let bits: u32 = {
            let mut rem: u32 = ver;
            for _ in 0..12 {
                rem = (rem << 1) ^ ((rem >> 11) * 0x1f25);
            }
            (ver << 12) | rem
        };
        debug_assert_eq!(bits >> 18, 0);

        for i in 0..18 {
            let bit: bool = get_bit(bits, i);
            let a: i32 = self.size - 11 + i % 3;
            let b: i32 = i / 3;
            self.set_function_module(a, b, bit);
            self.set_function_module(b, a, bit);
        }
    }

    fn draw_finder_pattern(&mut self, x: i32, y: i32) {
        for dy in -4..=4 {
            for dx in -4..=4 {
                let xx: i32 = x + dx;
                let yy: i32 = y + dy;
                if (0..self.size).contains(&xx) && (0..self.size).contains(&yy) {
                    let dist: i32 = dx.abs().max(dy.abs());
                    self.set_function_module(xx, yy, dist != 2 && dist != 4);
                }
            }
        }
    }

    fn draw_alignment_pattern(&mut self, x: i32, y: i32) {
        for dy in -2..=2 {
            for dx in -2..=2 {
                self.set_function_module(x + dx, y + dy, dx.abs().max(dy.abs()) != 1);
            }
        }
    }

    /*---- Codewords and masking ----*/

    fn add_ecc_and_interleave(&self, data: &[u8]) -> Vec<u8> {
        let ver: Version = self.version;
        let ecl: QrCodeEcc = self.ecl;
        assert_eq!(data.len(), QrCode::num_data_codewords(ver, ecl), "Illegal argument");

        let numblocks: usize = QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl);
        let blockecclen: usize = QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl);
        let rawcodewords: usize = QrCode::num_raw_data_modules(ver) / 8;
        let numshortblocks: usize = numblocks - rawcodewords % numblocks;
        let shortblocklen: usize = rawcodewords / numblocks;

        // Split data into blocks and append ECC to each block
        let mut blocks = Vec::<Vec<u8>>::with_capacity(numblocks);
        let rs = ReedSolomonGenerator::new(blockecclen);
        let mut k: usize = 0;
        for i in 0..numblocks {
            let datlen: usize = shortblocklen - blockecclen + usize::from(i >= numshortblocks);
            let mut dat = data[k..k + datlen].to_vec();
            k += datlen;
            let ecc: Vec<u8> = rs.remainder(&dat);
            if i < numshortblocks {
                dat.push(0);
            }
            dat.extend_from_slice(&ecc);
            blocks.push(dat);
        }

        // Interleave (not concatenate) the bytes from every block into a single sequence
        let mut result = Vec::<u8>::with_capacity(rawcodewords);
        for i in 0..=shortblocklen {
            for (j, block) in blocks.iter().enumerate() {
                // Skip the padding byte in short blocks
                if i != shortblocklen - blockecclen || j >= numshortblocks {
                    result.push(block[i]);
                }
            }
        }
        result
    }

    fn draw_codewords(&mut self, data: &[u8]) {
        assert_eq!(
            data.len(),
            QrCode::num_raw_data_modules(self.version) / 8,
            "Illegal argument"
        );
        let size: i32 = self.size;
        let mut i: usize = 0;
        let mut right: i32 = size - 1;
        while right >= 1 {
            if right == 6 {
                right = 5;
            }
            for vert in 0..size {
                for j in 0..2 {
                    let x: i32 = right - j;
                    let upward: bool = ((right + 1) & 2) == 0;
                    let y: i32 = if upward { size - 1 - vert } else { vert };
                    let index = (y * size + x) as usize;
                    if !self.is_function[index] && i < data.len() * 8 {
                        self.modules[index] = get_bit(u32::from(data[i >> 3]), 7 - ((i as i32) & 7));
                        i += 1;
                    }
                    // Remainder bits stay light
                }
            }
            right -= 2;
        }
        debug_assert_eq!(i, data.len() * 8);
    }

    fn apply_mask(&mut self, mask: Mask) {
        let size: i32 = self.size;
        for y in 0..size {
            for x in 0..size {
                let invert: bool = match mask.value() {
                    0 => (x + y) % 2 == 0,
                    1 => y % 2 == 0,
                    2 => x % 3 == 0,
                    3 => (x + y) % 3 == 0,
                    4 => (x / 3 + y / 2) % 2 == 0,
                    5 => (x * y) % 2 + (x * y) % 3 == 0,
                    6 => ((x * y) % 2 + (x * y) % 3) % 2 == 0,
                    7 => ((x + y) % 2 + (x * y) % 3) % 2 == 0,
                    _ => unreachable!(),
                };
                let index = (y * size + x) as usize;
                self.modules[index] ^= invert & !self.is_function[index];
            }
        }
    }

    fn penalty_score(&self) -> i32 {
        let mut result: i32 = 0;
        let size: i32 = self.size;

        // Adjacent modules in row having same color, and finder-like patterns
        for y in 0..size {
            let mut runcolor = false;
            let mut runx: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for x in 0..size {
                if self.module(x, y) == runcolor {
                    runx += 1;
                    if runx == 5 {
                        result += PENALTY_N1;
                    } else if runx > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runx);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.module(x, y);
                    runx = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runx) * PENALTY_N3;
        }
        // Adjacent modules in column having same color, and finder-like patterns
        for x in 0..size {
            let mut runcolor = false;
            let mut runy: i32 = 0;
            let mut runhistory = FinderPenalty::new(size);
            for y in 0..size {
                if self.module(x, y) == runcolor {
                    runy += 1;
                    if runy == 5 {
                        result += PENALTY_N1;
                    } else if runy > 5 {
                        result += 1;
                    }
                } else {
                    runhistory.add_history(runy);
                    if !runcolor {
                        result += runhistory.count_patterns() * PENALTY_N3;
                    }
                    runcolor = self.module(x, y);
                    runy = 1;
                }
            }
            result += runhistory.terminate_and_count(runcolor, runy) * PENALTY_N3;
        }

        // 2*2 blocks of modules having same color
        for y in 0..size - 1 {
            for x in 0..size - 1 {
                let color: bool = self.module(x, y);
                if color == self.module(x + 1, y)
                    && color == self.module(x, y + 1)
                    && color == self.module(x + 1, y + 1)
                {
                    result += PENALTY_N2;
                }
            }
        }

        // Balance of dark and light modules
        let dark = self.dark_count() as i32;
        let total: i32 = size * size;
        let k: i32 = ((dark * 20 - total * 10).abs() + total - 1) / total - 1;
        result += k * PENALTY_N4;
        result
    }

    /*---- Tables and capacity math ----*/

    fn alignment_pattern_positions(&self) -> Vec<i32> {
        let ver = i32::from(self.version.value());
        if ver == 1 {
            return Vec::new();
        }
        let numalign: i32 = ver / 7 + 2;
        let step: i32 = if ver == 32 {
            26
        } else {
            (ver * 4 + numalign * 2 + 1) / (numalign * 2 - 2) * 2
        };
        let mut result: Vec<i32> = (0..numalign - 1).map(|i| self.size - 7 - i * step).collect();
        result.push(6);
        result.reverse();
        result
    }

    fn num_raw_data_modules(ver: Version) -> usize {
        let ver = usize::from(ver.value());
        let mut result: usize = (16 * ver + 128) * ver + 64;
        if ver >= 2 {
            let numalign: usize = ver / 7 + 2;
            result -= (25 * numalign - 10) * numalign - 55;
            if ver >= 7 {
                result -= 36;
            }
        }
        result
    }

    /// Data codewords (8-bit bytes) available at the given version and level.
    pub fn num_data_codewords(ver: Version, ecl: QrCodeEcc) -> usize {
        QrCode::num_raw_data_modules(ver) / 8
            - QrCode::table_get(&ECC_CODEWORDS_PER_BLOCK, ver, ecl)
                * QrCode::table_get(&NUM_ERROR_CORRECTION_BLOCKS, ver, ecl)
    }

    fn table_get(table: &'static [[i8; 41]; 4], ver: Version, ecl: QrCodeEcc) -> usize {
        table[ecl.ordinal()][usize::from(ver.value())] as usize
    }
}

struct ReedSolomonGenerator {
    /// Divisor polynomial coefficients, highest to lowest power, leading 1 omitted.
    divisor: Vec<u8>,
}

impl ReedSolomonGenerator {
    fn new(degree: usize) -> Self {
        assert!((1..=255).contains(&degree), "Degree out of range");
        let mut divisor = vec![0u8; degree - 1];
        divisor.push(1); // Start off with the monomial x^0

        // Multiply by (x - r^0) * (x - r^1) * ... * (x - r^{degree-1})
        let mut root: u8 = 1;
        for _ in 0..degree {
            for j in 0..degree {
                divisor[j] = Self::multiply(divisor[j], root);
                if j + 1 < divisor.len() {
                    divisor[j] ^= divisor[j + 1];
                }
            }
            root = Self::multiply(root, 0x02);
        }
        Self { divisor }
    }

    fn remainder(&self, data: &[u8]) -> Vec<u8> {
        let mut result = vec![0u8; self.divisor.len()];
        for b in data {
            let factor: u8 = b ^ result.remove(0);
            result.push(0);
            for (x, &y) in result.iter_mut().zip(self.divisor.iter()) {
                *x ^= Self::multiply(y, factor);
            }
        }
        result
    }

    // Russian peasant multiplication in GF(2^8 / 0x11D)
    fn multiply(x: u8, y: u8) -> u8 {
        let mut z: u8 = 0;
        for i in (0..8).rev() {
            z = (z << 1) ^ ((z >> 7) * 0x1d);
            z ^= ((y >> i) & 1) * x;
        }
        z
    }
}

struct FinderPenalty {
    qr_size: i32,
    run_history: [i32; 7],
}

impl FinderPenalty {
    fn new(size: i32) -> Self {
        Self {
            qr_size: size,
            run_history: [0; 7],
        }
    }

    fn add_history(&mut self, mut currentrunlength: i32) {
        if self.run_history[0] == 0 {
            currentrunlength += self.qr_size; // Add light border to initial run
        }
        let len: usize = self.run_history.len();
        self.run_history.copy_within(0..len - 1, 1);
        self.run_history[0] = currentrunlength;
    }

    fn count_patterns(&self) -> i32 {
        let rh = &self.run_history;
        let n = rh[1];
        let core = n > 0 && rh[2] == n && rh[3] == n * 3 && rh[4] == n && rh[5] == n;
        i32::from(core && rh[0] >= n * 4 && rh[6] >= n) + i32::from(core && rh[6] >= n * 4 && rh[0] >= n)
    }

    fn terminate_and_count(mut self, currentruncolor: bool, mut currentrunlength: i32) -> i32 {
        if currentruncolor {
            self.add_history(currentrunlength);
            currentrunlength = 0;
        }
        currentrunlength += self.qr_size; // Add light border to final run
        self.add_history(currentrunlength);
        self.count_patterns()
    }
}

const PENALTY_N1: i32 = 3;
const PENALTY_N2: i32 = 3;
const PENALTY_N3: i32 = 40;
const PENALTY_N4: i32 = 10;

static ECC_CODEWORDS_PER_BLOCK: [[i8; 41]; 4] = [
    [
        -1, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28, 30,
        30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Low
    [
        -1, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ], // Medium
    [
        -1, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30, 30,
        30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // Quartile
    [
        -1, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24, 30,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ], // High
];

static NUM_ERROR_CORRECTION_BLOCKS: [[i8; 41]; 4] = [
    [
        -1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ], // Low
    [
        -1, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ], // Medium
    [
        -1, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ], // Quartile
    [
        -1, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ], // High
];

/// Error correction level for a QR code.
///
/// Serialized and parsed as the single letters `L`, `M`, `Q` and `H`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
pub enum QrCodeEcc {
    /// Tolerates ~7% erroneous codewords.
    #[serde(rename = "L")]
    Low,
    /// Tolerates ~15% erroneous codewords.
    #[serde(rename = "M")]
    Medium,
    /// Tolerates ~25% erroneous codewords.
    #[serde(rename = "Q")]
    Quartile,
    /// Tolerates ~30% erroneous codewords.
    #[serde(rename = "H")]
    High,
}

impl QrCodeEcc {
    /// All levels, weakest first.
    pub const ALL: [QrCodeEcc; 4] = [QrCodeEcc::Low, QrCodeEcc::Medium, QrCodeEcc::Quartile, QrCodeEcc::High];

    /// The single-letter name used in forms and config files.
    pub fn letter(self) -> char {
        match self {
            QrCodeEcc::Low => 'L',
            QrCodeEcc::Medium => 'M',
            QrCodeEcc::Quartile => 'Q',
            QrCodeEcc::High => 'H',
        }
    }

    fn ordinal(self) -> usize {
        use QrCodeEcc::*;
        match self {
            Low => 0,
            Medium => 1,
            Quartile => 2,
            High => 3,
        }
    }

    // The 2-bit value written into the format information
    fn format_bits(self) -> u8 {
        use QrCodeEcc::*;
        match self {
            Low => 1,
            Medium => 0,
            Quartile => 3,
            High => 2,
        }
    }
}

impl fmt::Display for QrCodeEcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for QrCodeEcc {
    type Err = UnknownEccLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "L" => Ok(QrCodeEcc::Low),
            "M" => Ok(QrCodeEcc::Medium),
            "Q" => Ok(QrCodeEcc::Quartile),
            "H" => Ok(QrCodeEcc::High),
            other => Err(UnknownEccLevel(other.to_string())),
        }
    }
}

/// Returned when parsing anything other than `L`, `M`, `Q` or `H`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown error correction level {0:?}")]
pub struct UnknownEccLevel(pub String);

/// A segment of data in a QR code.
///
/// Segments hold their payload as a bit sequence and are created with [`QrSegment::make_segments`]
/// or one of the per-mode constructors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrSegment {
    mode: QrSegmentMode,
    numchars: usize,
    data: Vec<bool>,
}

impl QrSegment {
    /// Picks the most compact single mode for `text`: numeric, alphanumeric, or bytes.
    pub fn make_segments(text: &str) -> Vec<Self> {
        if text.is_empty() {
            Vec::new()
        } else if let Some(seg) = QrSegment::make_numeric(text) {
            vec![seg]
        } else if let Some(seg) = QrSegment::make_alphanumeric(text) {
            vec![seg]
        } else {
            vec![QrSegment::make_bytes(text.as_bytes())]
        }
    }

    /// Creates a segment for binary data in byte mode.
    pub fn make_bytes(data: &[u8]) -> Self {
        let mut bb = BitBuffer(Vec::with_capacity(data.len() * 8));
        for &b in data {
            bb.append_bits(u32::from(b), 8);
        }
        QrSegment::new(QrSegmentMode::Byte, data.len(), bb.0)
    }

    /// Creates a numeric segment, or `None` if `text` has anything but ASCII digits.
    pub fn make_numeric(text: &str) -> Option<Self> {
        if !QrSegment::is_numeric(text) {
            return None;
        }
        let mut bb = BitBuffer(Vec::with_capacity(text.len() * 3 + (text.len() + 2) / 3));
        let mut accumdata: u32 = 0;
        let mut accumcount: u8 = 0;
        for b in text.bytes() {
            accumdata = accumdata * 10 + u32::from(b - b'0');
            accumcount += 1;
            if accumcount == 3 {
                bb.append_bits(accumdata, 10);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, accumcount * 3 + 1);
        }
        Some(QrSegment::new(QrSegmentMode::Numeric, text.len(), bb.0))
    }

    /// Creates an alphanumeric segment, or `None` if `text` is outside the QR alphanumeric set.
    ///
    /// Allowed characters: 0–9, A–Z (uppercase), space, `$`, `%`, `*`, `+`, `-`, `.`, `/`, `:`.
    pub fn make_alphanumeric(text: &str) -> Option<Self> {
        let mut bb = BitBuffer(Vec::with_capacity(text.len() * 6));
        let mut accumdata: u32 = 0;
        let mut accumcount: u32 = 0;
        for c in text.chars() {
            let i = ALPHANUMERIC_CHARSET.find(c)?;
            accumdata = accumdata * 45 + u32::try_from(i).ok()?;
            accumcount += 1;
            if accumcount == 2 {
                bb.append_bits(accumdata, 11);
                accumdata = 0;
                accumcount = 0;
            }
        }
        if accumcount > 0 {
            bb.append_bits(accumdata, 6);
        }
        Some(QrSegment::new(QrSegmentMode::Alphanumeric, text.len(), bb.0))
    }

    fn new(mode: QrSegmentMode, numchars: usize, data: Vec<bool>) -> Self {
        Self { mode, numchars, data }
    }

    pub fn mode(&self) -> QrSegmentMode {
        self.mode
    }

    pub fn num_chars(&self) -> usize {
        self.numchars
    }

    // None if a segment's character count does not fit its count field at this version
    fn total_bits(segs: &[Self], version: Version) -> Option<usize> {
        let mut result: usize = 0;
        for seg in segs {
            let ccbits: u8 = seg.mode.num_char_count_bits(version);
            if let Some(limit) = (1usize).checked_shl(ccbits.into()) {
                if seg.numchars >= limit {
                    return None;
                }
            }
            result = result.checked_add(4 + usize::from(ccbits))?;
            result = result.checked_add(seg.data.len())?;
        }
        Some(result)
    }

    pub fn is_numeric(text: &str) -> bool {
        text.chars().all(|c| c.is_ascii_digit())
    }

    pub fn is_alphanumeric(text: &str) -> bool {
        text.chars().all(|c| ALPHANUMERIC_CHARSET.contains(c))
    }
}

static ALPHANUMERIC_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum QrSegmentMode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl QrSegmentMode {
    fn mode_bits(self) -> u32 {
        use QrSegmentMode::*;
        match self {
            Numeric => 0x1,
            Alphanumeric => 0x2,
            Byte => 0x4,
        }
    }

    fn num_char_count_bits(self, ver: Version) -> u8 {
        use QrSegmentMode::*;
        (match self {
            Numeric => [10, 12, 14],
            Alphanumeric => [9, 11, 13],
            Byte => [8, 16, 16],
        })[usize::from((ver.value() + 7) / 17)]
    }
}

struct BitBuffer(Vec<bool>);

impl BitBuffer {
    fn append_bits(&mut self, val: u32, len: u8) {
        assert!(len <= 31 && (val >> len) == 0, "Value out of range");
        self.0.extend((0..i32::from(len)).rev().map(|i| get_bit(val, i)));
    }
}

/// Error type for when data exceeds QR code capacity.
///
/// Ways to handle this:
///
/// - Decrease the error correction level if it was greater than `QrCodeEcc::Low`.
/// - Shorten the payload (a shorter parameter name shortens every scan URL).
/// - Propagate the error upward to the caller/user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataTooLong {
    /// A segment's character count overflows its count field.
    #[error("Segment too long")]
    SegmentTooLong,
    /// Data length exceeds capacity.
    #[error("Data length = {0} bits, Max capacity = {1} bits")]
    DataOverCapacity(usize, usize),
}

/// A QR code version (1–40).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Version(u8);

impl Version {
    /// The minimum version number supported in the QR Code Model 2 standard.
    pub const MIN: Version = Version(1);

    /// The maximum version number supported in the QR Code Model 2 standard.
    pub const MAX: Version = Version(40);

    /// Creates a version object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [1, 40].
    pub const fn new(ver: u8) -> Self {
        assert!(
            Version::MIN.value() <= ver && ver <= Version::MAX.value(),
            "Version number out of range"
        );
        Self(ver)
    }

    /// Returns the value, which is in the range [1, 40].
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// A mask pattern (0–7).
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Mask(u8);

impl Mask {
    /// Creates a mask object from the given number.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range [0, 7].
    pub const fn new(mask: u8) -> Self {
        assert!(mask <= 7, "Mask value out of range");
        Self(mask)
    }

    /// Returns the value, which is in the range [0, 7].
    pub const fn value(self) -> u8 {
        self.0
    }
}

fn get_bit(x: u32, i: i32) -> bool {
    ((x >> i) & 1) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric() {
        assert!(QrSegment::is_numeric("1234567890"));
        assert!(!QrSegment::is_numeric("1234abc"));
    }

    #[test]
    fn test_is_alphanumeric() {
        assert!(QrSegment::is_alphanumeric("HELLO WORLD"));
        assert!(!QrSegment::is_alphanumeric("Hello World"));
    }

    #[test]
    fn test_segment_mode_selection() {
        assert_eq!(QrSegment::make_segments("0123")[0].mode(), QrSegmentMode::Numeric);
        assert_eq!(QrSegment::make_segments("ABCDEFGHIJ0123456789")[0].mode(), QrSegmentMode::Alphanumeric);
        assert_eq!(QrSegment::make_segments("https://peakbook.app")[0].mode(), QrSegmentMode::Byte);
        assert!(QrSegment::make_segments("").is_empty());
    }

    #[test]
    fn test_small_text_fits_version_one() {
        let qr = QrCode::encode_text("Hello, world!", QrCodeEcc::Low).unwrap();
        assert_eq!(qr.version().value(), 1);
        assert_eq!(qr.size(), 21);
        assert_eq!(qr.error_correction_level(), QrCodeEcc::Low);
    }

    #[test]
    fn test_scan_url_at_quartile_uses_version_five() {
        let qr = QrCode::encode_text("https://peakbook.app/scan?token=ABCDEFGHIJ0123456789", QrCodeEcc::Quartile).unwrap();
        assert_eq!(qr.version().value(), 5);
        assert_eq!(qr.size(), 37);
    }

    #[test]
    fn test_finder_patterns_are_drawn() {
        let qr = QrCode::encode_text("HELLO WORLD", QrCodeEcc::Quartile).unwrap();
        let far = qr.size() - 1;
        for (cx, cy) in [(3, 3), (far - 3, 3), (3, far - 3)] {
            assert!(qr.get_module(cx, cy), "finder center dark");
            assert!(!qr.get_module(cx - 2, cy - 2), "finder ring light");
            assert!(qr.get_module(cx - 3, cy - 3), "finder border dark");
        }
        assert!(qr.is_finder(0, 0));
        assert!(!qr.is_finder(far, far));
        // The module next to the bottom-left format bits is always dark
        assert!(qr.get_module(8, qr.size() - 8));
    }

    #[test]
    fn test_out_of_range_modules_are_light() {
        let qr = QrCode::encode_text("1234", QrCodeEcc::Medium).unwrap();
        assert!(!qr.get_module(-1, 0));
        assert!(!qr.get_module(0, qr.size()));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = QrCode::encode_text("peakbook", QrCodeEcc::High).unwrap();
        let b = QrCode::encode_text("peakbook", QrCodeEcc::High).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fixed_mask_is_respected() {
        let segs = QrSegment::make_segments("peakbook");
        let qr = QrCode::encode_segments(&segs, QrCodeEcc::Low, Version::MIN, Version::MAX, Some(Mask::new(5)), false).unwrap();
        assert_eq!(qr.mask().value(), 5);
    }

    #[test]
    fn test_boost_raises_level_without_growing() {
        let segs = QrSegment::make_segments("1");
        let qr = QrCode::encode_segments(&segs, QrCodeEcc::Low, Version::MIN, Version::MAX, None, true).unwrap();
        assert_eq!(qr.error_correction_level(), QrCodeEcc::High);
        assert_eq!(qr.version().value(), 1);
    }

    #[test]
    fn test_data_over_capacity() {
        let text = "a".repeat(3000);
        match QrCode::encode_text(&text, QrCodeEcc::High) {
            Err(DataTooLong::DataOverCapacity(used, cap)) => assert!(used > cap),
            other => panic!("expected capacity error, got {:?}", other.map(|q| q.size())),
        }
    }

    #[test]
    fn test_symbols_decode_at_every_level() {
        let scan_url = "https://peakbook.app/scan?token=ABCDEFGHIJ0123456789";
        let long = "x".repeat(900);
        let payloads = [scan_url, "HELLO WORLD 123", "31415926535897932384626433832795", long.as_str()];

        for level in QrCodeEcc::ALL {
            for payload in payloads {
                let img = crate::export::preview_image(payload, level, 4).unwrap();
                let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
                    img.width() as usize,
                    img.height() as usize,
                    |x, y| img.get_pixel(x as u32, y as u32).0[0],
                );
                let grids = prepared.detect_grids();
                assert_eq!(grids.len(), 1, "{level} {payload}");
                let (_, content) = grids[0].decode().unwrap();
                assert_eq!(content, payload, "{level}");
            }
        }
    }

    #[test]
    fn test_ecc_letters_round_trip() {
        for level in QrCodeEcc::ALL {
            assert_eq!(level.to_string().parse::<QrCodeEcc>(), Ok(level));
        }
        assert!("X".parse::<QrCodeEcc>().is_err());
        assert!("q".parse::<QrCodeEcc>().is_err());
    }
}
