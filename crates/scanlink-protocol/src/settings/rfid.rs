//! RFID reader settings and the auto link profile.

use serde::{Deserialize, Serialize};

use super::{Bounds, SettingsNode, Walker};

choice! {
    pub enum RfidTriggerMode {
        AutoOff = 0,
        #[default]
        Momentary = 1,
        Alternate = 2,
        Continuous1 = 3,
        Continuous2 = 4,
    }
}

choice! {
    /// Gen2 inventory session.
    pub enum SessionFlag {
        #[default]
        S0 = 0,
        S1 = 1,
        S2 = 2,
        S3 = 3,
    }
}

choice! {
    /// Antenna polarization used while reading.
    pub enum Polarization {
        V = 0,
        H = 1,
        #[default]
        Both = 2,
    }
}

choice! {
    pub enum DoubleReading {
        #[default]
        Free = 0,
        Prevent1 = 1,
        Prevent2 = 2,
    }
}

choice! {
    /// Air-interface link profile.
    pub enum LinkProfile {
        #[default]
        P1 = 1,
        P4 = 4,
        P5 = 5,
    }
}

choice! {
    pub enum PowerSaveExt {
        #[default]
        Disable = 0,
        Mode1 = 1,
        Mode2 = 2,
    }
}

/// Root of the RFID settings tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidSettings {
    pub scan: RfidScan,
}

impl SettingsNode for RfidSettings {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.node("scan", &mut self.scan);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidScan {
    pub trigger_mode: RfidTriggerMode,
    /// Tags reported per trigger in one-shot mode, 0 for unlimited.
    pub one_shot: u16,
    /// Output power while reading, in 0.1 dBm.
    pub power_level_read: u16,
    /// Output power while writing, in 0.1 dBm.
    pub power_level_write: u16,
    /// Channel bitmask.
    pub channel: u32,
    pub q_param: u8,
    pub session_flag: SessionFlag,
    pub session_init: bool,
    pub polarization: Polarization,
    pub power_save: bool,
    pub write_verify: bool,
    pub double_reading: DoubleReading,
    pub link_profile: LinkProfile,
    pub power_save_ext: PowerSaveExt,
}

impl Default for RfidScan {
    fn default() -> Self {
        Self {
            trigger_mode: RfidTriggerMode::default(),
            one_shot: 0,
            power_level_read: 300,
            power_level_write: 300,
            channel: 0x1FF8,
            q_param: 4,
            session_flag: SessionFlag::default(),
            session_init: false,
            polarization: Polarization::default(),
            power_save: true,
            write_verify: true,
            double_reading: DoubleReading::default(),
            link_profile: LinkProfile::default(),
            power_save_ext: PowerSaveExt::default(),
        }
    }
}

impl SettingsNode for RfidScan {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.choice("trigger_mode", &mut self.trigger_mode);
        w.number("one_shot", &mut self.one_shot, Bounds::new(0, 255));
        w.number(
            "power_level_read",
            &mut self.power_level_read,
            Bounds::new(40, 300),
        );
        w.number(
            "power_level_write",
            &mut self.power_level_write,
            Bounds::new(40, 300),
        );
        w.number("channel", &mut self.channel, Bounds::new(1, 0x7FFFF));
        w.number("q_param", &mut self.q_param, Bounds::new(0, 7));
        w.choice("session_flag", &mut self.session_flag);
        w.flag("session_init", &mut self.session_init);
        w.choice("polarization", &mut self.polarization);
        w.flag("power_save", &mut self.power_save);
        w.flag("write_verify", &mut self.write_verify);
        w.choice("double_reading", &mut self.double_reading);
        w.choice("link_profile", &mut self.link_profile);
        w.choice("power_save_ext", &mut self.power_save_ext);
    }
}

/// Q range and sequence used when the reader picks the link profile itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLinkProfileSettings {
    pub sequence: u16,
    pub min_q: u8,
    pub max_q: u8,
}

impl Default for AutoLinkProfileSettings {
    fn default() -> Self {
        Self {
            sequence: 0,
            min_q: 0,
            max_q: 15,
        }
    }
}

impl SettingsNode for AutoLinkProfileSettings {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.number("sequence", &mut self.sequence, Bounds::new(0, 255));
        w.number("min_q", &mut self.min_q, Bounds::new(0, 15));
        w.number("max_q", &mut self.max_q, Bounds::new(0, 15));
        w.check(
            "max_q",
            self.min_q <= self.max_q,
            &self.max_q,
            &format!(">= min_q ({})", self.min_q),
        );
    }
}
