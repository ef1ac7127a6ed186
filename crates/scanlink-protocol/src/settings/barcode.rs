//! Barcode reader settings: scan, decode, editing and power-off delay.

use serde::{Deserialize, Serialize};

use super::{Bounds, Choice, SettingsNode, TextRule, Walker, range_pair};

/// Longest symbol length any length leaf accepts.
const MAX_SYMBOL_LENGTH: u64 = 99;

choice! {
    pub enum BarcodeTriggerMode {
        AutoOff = 0,
        #[default]
        Momentary = 1,
        Alternate = 2,
        Continuous = 3,
        TriggerRelease = 4,
    }
}

choice! {
    pub enum LightMode {
        #[default]
        Auto = 0,
        AlwaysOn = 1,
        Off = 2,
    }
}

choice! {
    pub enum MarkerMode {
        #[default]
        Normal = 0,
        Ahead = 1,
        Off = 2,
    }
}

choice! {
    pub enum SideLightMode {
        #[default]
        On = 0,
        Off = 1,
    }
}

choice! {
    pub enum InvertMode {
        #[default]
        Disabled = 0,
        InversionOnly = 1,
        Auto = 2,
    }
}

choice! {
    /// Symbology expected on one line of a multi-line read.
    pub enum MultiLineSymbology {
        #[default]
        None = 0,
        Ean13UpcA = 1,
        Ean8 = 2,
        UpcE = 3,
        Itf = 4,
        Stf = 5,
        Codabar = 6,
        Code39 = 7,
        Code93 = 8,
        Code128 = 9,
    }
}

impl MultiLineSymbology {
    /// Smallest non-zero length bound for this symbology.
    fn min_length(self) -> u64 {
        match self {
            MultiLineSymbology::Itf | MultiLineSymbology::Stf => 2,
            MultiLineSymbology::Codabar => 3,
            _ => 1,
        }
    }

    fn start_stop_rule(self) -> TextRule {
        match self {
            MultiLineSymbology::Codabar => TextRule::CodabarStartStop,
            MultiLineSymbology::Stf => TextRule::StfStartStop,
            _ => TextRule::Free,
        }
    }
}

choice! {
    pub enum QrSplitMode {
        #[default]
        Disabled = 0,
        Edit = 1,
        BatchEdit = 2,
        NonEdit = 3,
    }
}

choice! {
    pub enum IqrSplitMode {
        #[default]
        Disabled = 0,
        Edit = 1,
        NonEdit = 2,
    }
}

choice! {
    /// What an SQRC read with the correct key reports.
    pub enum SqrcCorrectKeyDecode {
        #[default]
        PublicAndPrivateData = 0,
        OnlyPrivateData = 1,
    }
}

choice! {
    /// What an SQRC read with the wrong key reports.
    pub enum SqrcIncorrectKeyDecode {
        None = 0,
        #[default]
        OnlyPublicData = 1,
    }
}

/// Root of the barcode settings tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeSettings {
    pub scan: BarcodeScan,
    pub decode: BarcodeDecode,
    pub editing: BarcodeEditing,
    pub power_off_delay: PowerOffDelay,
}

impl SettingsNode for BarcodeSettings {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.node("scan", &mut self.scan);
        w.node("decode", &mut self.decode);
        w.node("editing", &mut self.editing);
        w.node("power_off_delay", &mut self.power_off_delay);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeScan {
    pub trigger_mode: BarcodeTriggerMode,
    pub light_mode: LightMode,
    pub marker_mode: MarkerMode,
    pub side_light_mode: SideLightMode,
}

impl SettingsNode for BarcodeScan {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.choice("trigger_mode", &mut self.trigger_mode);
        w.choice("light_mode", &mut self.light_mode);
        w.choice("marker_mode", &mut self.marker_mode);
        w.choice("side_light_mode", &mut self.side_light_mode);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeDecode {
    /// Minimum gap before the same symbol is reported again, in 100 ms units.
    pub same_barcode_interval: u16,
    pub invert_mode: InvertMode,
    /// 1 (fast) ..= 9 (thorough).
    pub decode_level: u8,
    pub length_min_itf: u8,
    pub length_min_stf: u8,
    pub length_min_codabar: u8,
    pub point_scan: bool,
    pub reverse: bool,
    pub mirror_reflection: bool,
    pub charset: String,
    pub multi_line: MultiLineMode,
    pub symbologies: Symbologies,
}

impl Default for BarcodeDecode {
    fn default() -> Self {
        Self {
            same_barcode_interval: 10,
            invert_mode: InvertMode::default(),
            decode_level: 5,
            length_min_itf: 4,
            length_min_stf: 3,
            length_min_codabar: 4,
            point_scan: false,
            reverse: false,
            mirror_reflection: false,
            charset: "UTF-8".to_string(),
            multi_line: MultiLineMode::default(),
            symbologies: Symbologies::default(),
        }
    }
}

impl SettingsNode for BarcodeDecode {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.number(
            "same_barcode_interval",
            &mut self.same_barcode_interval,
            Bounds::new(0, 255),
        );
        w.choice("invert_mode", &mut self.invert_mode);
        w.number("decode_level", &mut self.decode_level, Bounds::new(1, 9));
        w.number("length_min_itf", &mut self.length_min_itf, Bounds::new(2, 20));
        w.number("length_min_stf", &mut self.length_min_stf, Bounds::new(1, 20));
        w.number(
            "length_min_codabar",
            &mut self.length_min_codabar,
            Bounds::new(3, 20),
        );
        w.flag("point_scan", &mut self.point_scan);
        w.flag("reverse", &mut self.reverse);
        w.flag("mirror_reflection", &mut self.mirror_reflection);
        w.text("charset", &mut self.charset, TextRule::Free);
        w.node("multi_line", &mut self.multi_line);
        w.node("symbologies", &mut self.symbologies);
    }
}

/// Reading one symbol printed across up to three lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLineMode {
    pub enabled: bool,
    pub first: MultiLineEntry,
    pub second: MultiLineEntry,
    pub third: MultiLineEntry,
}

impl MultiLineMode {
    /// Lines per logical read: leading entries with a symbology, at least one.
    pub fn line_count(&self) -> usize {
        if !self.enabled {
            return 1;
        }
        [&self.first, &self.second, &self.third]
            .into_iter()
            .take_while(|e| e.symbology != MultiLineSymbology::None)
            .count()
            .max(1)
    }

    /// Enable multi-line mode with the given symbology per line.
    pub fn with_lines(symbologies: &[MultiLineSymbology]) -> Self {
        let entry = |i: usize| MultiLineEntry {
            symbology: symbologies.get(i).copied().unwrap_or_default(),
            ..MultiLineEntry::default()
        };
        Self {
            enabled: true,
            first: entry(0),
            second: entry(1),
            third: entry(2),
        }
    }
}

impl SettingsNode for MultiLineMode {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.node("first", &mut self.first);
        w.node("second", &mut self.second);
        w.node("third", &mut self.third);

        let gap = self.second.symbology == MultiLineSymbology::None
            && self.third.symbology != MultiLineSymbology::None;
        w.check(
            "third.symbology",
            !gap,
            &self.third.symbology.code(),
            "none while second.symbology is none",
        );
    }
}

/// Per-line constraints of a multi-line read.
///
/// Length bounds use 0 for "unspecified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLineEntry {
    pub symbology: MultiLineSymbology,
    pub first_character: String,
    pub second_character: String,
    pub start_stop_character: String,
    pub length_min: u8,
    pub length_max: u8,
    pub verify_check_digit: bool,
}

impl SettingsNode for MultiLineEntry {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.choice("symbology", &mut self.symbology);
        w.text(
            "first_character",
            &mut self.first_character,
            TextRule::LeadingCharacter,
        );
        w.text(
            "second_character",
            &mut self.second_character,
            TextRule::LeadingCharacter,
        );
        w.text(
            "start_stop_character",
            &mut self.start_stop_character,
            self.symbology.start_stop_rule(),
        );
        let bounds = Bounds::new(self.symbology.min_length(), MAX_SYMBOL_LENGTH).or_zero();
        range_pair(w, "length", &mut self.length_min, &mut self.length_max, bounds);
        w.flag("verify_check_digit", &mut self.verify_check_digit);
    }
}

/// EAN-13/UPC-A, EAN-8 and UPC-E share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcEanSymbology {
    pub enabled: bool,
    pub first_character: String,
    pub second_character: String,
    pub add_on: AddOn,
}

impl Default for UpcEanSymbology {
    fn default() -> Self {
        Self {
            enabled: true,
            first_character: String::new(),
            second_character: String::new(),
            add_on: AddOn::default(),
        }
    }
}

impl SettingsNode for UpcEanSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.text(
            "first_character",
            &mut self.first_character,
            TextRule::LeadingCharacter,
        );
        w.text(
            "second_character",
            &mut self.second_character,
            TextRule::LeadingCharacter,
        );
        w.node("add_on", &mut self.add_on);
    }
}

/// Supplemental 2/5-digit add-on codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOn {
    pub enabled: bool,
    pub two_digit: bool,
    pub five_digit: bool,
    pub only_with_add_on: bool,
}

impl SettingsNode for AddOn {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.flag("two_digit", &mut self.two_digit);
        w.flag("five_digit", &mut self.five_digit);
        w.flag("only_with_add_on", &mut self.only_with_add_on);
    }
}

/// Length-bounded symbology with optional check-digit verification.
///
/// `MIN` is the shortest length the symbology can encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedSymbology<const MIN: u8> {
    pub enabled: bool,
    pub length_min: u8,
    pub length_max: u8,
    pub verify_check_digit: bool,
}

/// Interleaved 2 of 5.
pub type ItfSymbology = CheckedSymbology<2>;

pub type Code39Symbology = CheckedSymbology<1>;

impl<const MIN: u8> Default for CheckedSymbology<MIN> {
    fn default() -> Self {
        Self {
            enabled: true,
            length_min: MIN,
            length_max: MAX_SYMBOL_LENGTH as u8,
            verify_check_digit: false,
        }
    }
}

impl<const MIN: u8> SettingsNode for CheckedSymbology<MIN> {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(u64::from(MIN), MAX_SYMBOL_LENGTH),
        );
        w.flag("verify_check_digit", &mut self.verify_check_digit);
    }
}

/// Length-bounded symbology whose check digit is always verified by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthSymbology {
    pub enabled: bool,
    pub length_min: u8,
    pub length_max: u8,
}

impl Default for LengthSymbology {
    fn default() -> Self {
        Self {
            enabled: true,
            length_min: 1,
            length_max: MAX_SYMBOL_LENGTH as u8,
        }
    }
}

impl SettingsNode for LengthSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(1, MAX_SYMBOL_LENGTH),
        );
    }
}

/// Standard 2 of 5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StfSymbology {
    pub enabled: bool,
    pub length_min: u8,
    pub length_max: u8,
    pub verify_check_digit: bool,
    /// `""`, `"S"` (short) or `"N"` (normal).
    pub start_stop_character: String,
}

impl Default for StfSymbology {
    fn default() -> Self {
        Self {
            enabled: false,
            length_min: 2,
            length_max: MAX_SYMBOL_LENGTH as u8,
            verify_check_digit: false,
            start_stop_character: String::new(),
        }
    }
}

impl SettingsNode for StfSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(2, MAX_SYMBOL_LENGTH),
        );
        w.flag("verify_check_digit", &mut self.verify_check_digit);
        w.text(
            "start_stop_character",
            &mut self.start_stop_character,
            TextRule::StfStartStop,
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodabarSymbology {
    pub enabled: bool,
    pub length_min: u8,
    pub length_max: u8,
    pub verify_check_digit: bool,
    /// `""`, or start and stop character each in `A..=D`, `?` for any.
    pub start_stop_character: String,
}

impl Default for CodabarSymbology {
    fn default() -> Self {
        Self {
            enabled: true,
            length_min: 3,
            length_max: MAX_SYMBOL_LENGTH as u8,
            verify_check_digit: false,
            start_stop_character: String::new(),
        }
    }
}

impl SettingsNode for CodabarSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(3, MAX_SYMBOL_LENGTH),
        );
        w.flag("verify_check_digit", &mut self.verify_check_digit);
        w.text(
            "start_stop_character",
            &mut self.start_stop_character,
            TextRule::CodabarStartStop,
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsiSymbology {
    pub enabled: bool,
    pub length_min: u8,
    pub length_max: u8,
    /// Number of check digits verified, 1 or 2.
    pub check_digits: u8,
}

impl Default for MsiSymbology {
    fn default() -> Self {
        Self {
            enabled: false,
            length_min: 1,
            length_max: MAX_SYMBOL_LENGTH as u8,
            check_digits: 1,
        }
    }
}

impl SettingsNode for MsiSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(1, MAX_SYMBOL_LENGTH),
        );
        w.number("check_digits", &mut self.check_digits, Bounds::new(1, 2));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gs1DataBarSymbology {
    pub enabled: bool,
    pub stacked: bool,
}

impl SettingsNode for Gs1DataBarSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.flag("stacked", &mut self.stacked);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gs1DataBarExpandedSymbology {
    pub enabled: bool,
    pub stacked: bool,
    pub length_min: u8,
    pub length_max: u8,
}

impl Default for Gs1DataBarExpandedSymbology {
    fn default() -> Self {
        Self {
            enabled: false,
            stacked: false,
            length_min: 1,
            length_max: MAX_SYMBOL_LENGTH as u8,
        }
    }
}

impl SettingsNode for Gs1DataBarExpandedSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.flag("stacked", &mut self.stacked);
        range_pair(
            w,
            "length",
            &mut self.length_min,
            &mut self.length_max,
            Bounds::new(1, MAX_SYMBOL_LENGTH),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCodeSymbology {
    pub enabled: bool,
    pub split_mode: QrSplitMode,
    pub model1_version_min: u8,
    pub model1_version_max: u8,
    pub model2_version_min: u8,
    pub model2_version_max: u8,
}

impl Default for QrCodeSymbology {
    fn default() -> Self {
        Self {
            enabled: true,
            split_mode: QrSplitMode::default(),
            model1_version_min: 1,
            model1_version_max: 22,
            model2_version_min: 1,
            model2_version_max: 40,
        }
    }
}

impl SettingsNode for QrCodeSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.choice("split_mode", &mut self.split_mode);
        range_pair(
            w,
            "model1_version",
            &mut self.model1_version_min,
            &mut self.model1_version_max,
            Bounds::new(1, 22),
        );
        range_pair(
            w,
            "model2_version",
            &mut self.model2_version_min,
            &mut self.model2_version_max,
            Bounds::new(1, 40),
        );
    }
}

/// Micro QR and SQRC: a version range bounded by `MAX`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedSymbology<const MAX: u8> {
    pub enabled: bool,
    pub version_min: u8,
    pub version_max: u8,
}

pub type MicroQrSymbology = VersionedSymbology<4>;

pub type SqrcSymbology = VersionedSymbology<40>;

impl<const MAX: u8> Default for VersionedSymbology<MAX> {
    fn default() -> Self {
        Self {
            enabled: false,
            version_min: 1,
            version_max: MAX,
        }
    }
}

impl<const MAX: u8> SettingsNode for VersionedSymbology<MAX> {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "version",
            &mut self.version_min,
            &mut self.version_max,
            Bounds::new(1, u64::from(MAX)),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IqrCodeSymbology {
    pub enabled: bool,
    pub split_mode: IqrSplitMode,
    pub square_min: u8,
    pub square_max: u8,
    pub rectangle_min: u8,
    pub rectangle_max: u8,
}

impl Default for IqrCodeSymbology {
    fn default() -> Self {
        Self {
            enabled: false,
            split_mode: IqrSplitMode::default(),
            square_min: 1,
            square_max: 61,
            rectangle_min: 1,
            rectangle_max: 15,
        }
    }
}

impl SettingsNode for IqrCodeSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.choice("split_mode", &mut self.split_mode);
        range_pair(
            w,
            "square",
            &mut self.square_min,
            &mut self.square_max,
            Bounds::new(1, 61),
        );
        range_pair(
            w,
            "rectangle",
            &mut self.rectangle_min,
            &mut self.rectangle_max,
            Bounds::new(1, 15),
        );
    }
}

/// Data Matrix code-number ranges for square and rectangular symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMatrixSymbology {
    pub enabled: bool,
    pub square_min: u8,
    pub square_max: u8,
    pub rectangle_min: u8,
    pub rectangle_max: u8,
}

impl Default for DataMatrixSymbology {
    fn default() -> Self {
        Self {
            enabled: true,
            square_min: 1,
            square_max: 24,
            rectangle_min: 1,
            rectangle_max: 6,
        }
    }
}

impl SettingsNode for DataMatrixSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        range_pair(
            w,
            "square",
            &mut self.square_min,
            &mut self.square_max,
            Bounds::new(1, 24),
        );
        range_pair(
            w,
            "rectangle",
            &mut self.rectangle_min,
            &mut self.rectangle_max,
            Bounds::new(1, 6),
        );
    }
}

/// Symbology with no parameters besides being enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleSymbology {
    pub enabled: bool,
}

impl SimpleSymbology {
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }
}

impl SettingsNode for SimpleSymbology {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
    }
}

/// One entry per supported barcode type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbologies {
    pub ean13_upca: UpcEanSymbology,
    pub ean8: UpcEanSymbology,
    pub upce: UpcEanSymbology,
    pub itf: ItfSymbology,
    pub stf: StfSymbology,
    pub codabar: CodabarSymbology,
    pub code39: Code39Symbology,
    pub code93: LengthSymbology,
    pub code128: LengthSymbology,
    pub msi: MsiSymbology,
    pub gs1_databar: Gs1DataBarSymbology,
    pub gs1_databar_limited: SimpleSymbology,
    pub gs1_databar_expanded: Gs1DataBarExpandedSymbology,
    pub gs1_composite: SimpleSymbology,
    pub qr_code: QrCodeSymbology,
    pub micro_qr: MicroQrSymbology,
    pub sqrc: SqrcSymbology,
    pub iqr_code: IqrCodeSymbology,
    pub data_matrix: DataMatrixSymbology,
    pub pdf417: SimpleSymbology,
    pub micro_pdf417: SimpleSymbology,
    pub maxi_code: SimpleSymbology,
    pub plessey: SimpleSymbology,
    pub aztec: SimpleSymbology,
}

impl Default for Symbologies {
    fn default() -> Self {
        Self {
            ean13_upca: UpcEanSymbology::default(),
            ean8: UpcEanSymbology::default(),
            upce: UpcEanSymbology::default(),
            itf: ItfSymbology::default(),
            stf: StfSymbology::default(),
            codabar: CodabarSymbology::default(),
            code39: Code39Symbology::default(),
            code93: LengthSymbology::default(),
            code128: LengthSymbology::default(),
            msi: MsiSymbology::default(),
            gs1_databar: Gs1DataBarSymbology::default(),
            gs1_databar_limited: SimpleSymbology::default(),
            gs1_databar_expanded: Gs1DataBarExpandedSymbology::default(),
            gs1_composite: SimpleSymbology::default(),
            qr_code: QrCodeSymbology::default(),
            micro_qr: MicroQrSymbology::default(),
            sqrc: SqrcSymbology::default(),
            iqr_code: IqrCodeSymbology::default(),
            data_matrix: DataMatrixSymbology::default(),
            pdf417: SimpleSymbology::enabled(),
            micro_pdf417: SimpleSymbology::default(),
            maxi_code: SimpleSymbology::default(),
            plessey: SimpleSymbology::default(),
            aztec: SimpleSymbology::default(),
        }
    }
}

impl SettingsNode for Symbologies {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.node("ean13_upca", &mut self.ean13_upca);
        w.node("ean8", &mut self.ean8);
        w.node("upce", &mut self.upce);
        w.node("itf", &mut self.itf);
        w.node("stf", &mut self.stf);
        w.node("codabar", &mut self.codabar);
        w.node("code39", &mut self.code39);
        w.node("code93", &mut self.code93);
        w.node("code128", &mut self.code128);
        w.node("msi", &mut self.msi);
        w.node("gs1_databar", &mut self.gs1_databar);
        w.node("gs1_databar_limited", &mut self.gs1_databar_limited);
        w.node("gs1_databar_expanded", &mut self.gs1_databar_expanded);
        w.node("gs1_composite", &mut self.gs1_composite);
        w.node("qr_code", &mut self.qr_code);
        w.node("micro_qr", &mut self.micro_qr);
        w.node("sqrc", &mut self.sqrc);
        w.node("iqr_code", &mut self.iqr_code);
        w.node("data_matrix", &mut self.data_matrix);
        w.node("pdf417", &mut self.pdf417);
        w.node("micro_pdf417", &mut self.micro_pdf417);
        w.node("maxi_code", &mut self.maxi_code);
        w.node("plessey", &mut self.plessey);
        w.node("aztec", &mut self.aztec);
    }
}

/// Post-processing applied to decoded data before it is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeEditing {
    pub ean13: CheckDigitEditing,
    pub upca: UpcAEditing,
    pub ean8: Ean8Editing,
    pub upce: UpcEEditing,
    pub code39: Code39Editing,
    pub codabar: CodabarEditing,
    pub itf: CheckDigitEditing,
    pub stf: CheckDigitEditing,
    pub sqrc: SqrcEditing,
}

impl SettingsNode for BarcodeEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.node("ean13", &mut self.ean13);
        w.node("upca", &mut self.upca);
        w.node("ean8", &mut self.ean8);
        w.node("upce", &mut self.upce);
        w.node("code39", &mut self.code39);
        w.node("codabar", &mut self.codabar);
        w.node("itf", &mut self.itf);
        w.node("stf", &mut self.stf);
        w.node("sqrc", &mut self.sqrc);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDigitEditing {
    pub report_check_digit: bool,
}

impl Default for CheckDigitEditing {
    fn default() -> Self {
        Self {
            report_check_digit: true,
        }
    }
}

impl SettingsNode for CheckDigitEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcAEditing {
    pub report_check_digit: bool,
    pub add_leading_zero: bool,
}

impl Default for UpcAEditing {
    fn default() -> Self {
        Self {
            report_check_digit: true,
            add_leading_zero: false,
        }
    }
}

impl SettingsNode for UpcAEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
        w.flag("add_leading_zero", &mut self.add_leading_zero);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ean8Editing {
    pub report_check_digit: bool,
    pub convert_to_ean13: bool,
}

impl Default for Ean8Editing {
    fn default() -> Self {
        Self {
            report_check_digit: true,
            convert_to_ean13: false,
        }
    }
}

impl SettingsNode for Ean8Editing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
        w.flag("convert_to_ean13", &mut self.convert_to_ean13);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcEEditing {
    pub report_check_digit: bool,
    pub add_leading_zero: bool,
    pub convert_to_upca: bool,
    /// Keep the number-system digit when converting to UPC-A.
    pub report_number_system_character: bool,
}

impl Default for UpcEEditing {
    fn default() -> Self {
        Self {
            report_check_digit: true,
            add_leading_zero: false,
            convert_to_upca: false,
            report_number_system_character: false,
        }
    }
}

impl SettingsNode for UpcEEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
        w.flag("add_leading_zero", &mut self.add_leading_zero);
        w.flag("convert_to_upca", &mut self.convert_to_upca);
        w.flag(
            "report_number_system_character",
            &mut self.report_number_system_character,
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code39Editing {
    pub report_check_digit: bool,
    pub report_start_stop_character: bool,
}

impl SettingsNode for Code39Editing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
        w.flag(
            "report_start_stop_character",
            &mut self.report_start_stop_character,
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodabarEditing {
    pub report_check_digit: bool,
    pub report_start_stop_character: bool,
    pub convert_to_upper_case: bool,
}

impl SettingsNode for CodabarEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("report_check_digit", &mut self.report_check_digit);
        w.flag(
            "report_start_stop_character",
            &mut self.report_start_stop_character,
        );
        w.flag("convert_to_upper_case", &mut self.convert_to_upper_case);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqrcEditing {
    pub correct_key_decode: SqrcCorrectKeyDecode,
    pub incorrect_key_decode: SqrcIncorrectKeyDecode,
}

impl SettingsNode for SqrcEditing {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.choice("correct_key_decode", &mut self.correct_key_decode);
        w.choice("incorrect_key_decode", &mut self.incorrect_key_decode);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerOffDelay {
    /// Delay before the reader powers down after a read, in milliseconds.
    pub time_ms: u32,
}

impl Default for PowerOffDelay {
    fn default() -> Self {
        Self { time_ms: 1000 }
    }
}

impl SettingsNode for PowerOffDelay {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.number("time_ms", &mut self.time_ms, Bounds::new(0, 60_000));
    }
}
