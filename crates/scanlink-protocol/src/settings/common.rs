//! Parameters shared by every reader module: buzzer, power and Bluetooth behaviour.

use serde::{Deserialize, Serialize};

use super::{Bounds, SettingsNode, Walker};

choice! {
    pub enum BuzzerVolume {
        Low = 0,
        #[default]
        Middle = 1,
        Loud = 2,
    }
}

choice! {
    pub enum BuzzerTone {
        Low = 0,
        #[default]
        Middle = 1,
        High = 2,
    }
}

choice! {
    pub enum BuzzerDuration {
        Short = 0,
        #[default]
        Middle = 1,
        Long = 2,
    }
}

choice! {
    /// How the accessory reconnects after the Bluetooth link drops.
    pub enum ReconnectPolicy {
        /// Pair again from scratch.
        Repairing = 0,
        /// Wait for the last host to reconnect.
        #[default]
        WaitHost = 1,
        /// Accept any host that connects first.
        Any = 2,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonParams {
    pub power_save: bool,
    pub power_on_buzzer: bool,
    /// Sound the buzzer when a battery check is requested.
    pub battery_confirmation: bool,
    pub buzzer: BuzzerParams,
    pub auto_power_off: AutoPowerOff,
    pub bt_button: BluetoothButton,
    pub notification: ReadNotification,
}

impl Default for CommonParams {
    fn default() -> Self {
        Self {
            power_save: true,
            power_on_buzzer: true,
            battery_confirmation: false,
            buzzer: BuzzerParams::default(),
            auto_power_off: AutoPowerOff::default(),
            bt_button: BluetoothButton::default(),
            notification: ReadNotification::default(),
        }
    }
}

impl SettingsNode for CommonParams {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("power_save", &mut self.power_save);
        w.flag("power_on_buzzer", &mut self.power_on_buzzer);
        w.flag("battery_confirmation", &mut self.battery_confirmation);
        w.node("buzzer", &mut self.buzzer);
        w.node("auto_power_off", &mut self.auto_power_off);
        w.node("bt_button", &mut self.bt_button);
        w.node("notification", &mut self.notification);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuzzerParams {
    pub volume: BuzzerVolume,
    pub tone: BuzzerTone,
    pub duration: BuzzerDuration,
}

impl SettingsNode for BuzzerParams {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.choice("volume", &mut self.volume);
        w.choice("tone", &mut self.tone);
        w.choice("duration", &mut self.duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPowerOff {
    pub enabled: bool,
    /// Idle minutes before power-off.
    pub duration_min: u16,
}

impl Default for AutoPowerOff {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_min: 60,
        }
    }
}

impl SettingsNode for AutoPowerOff {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("enabled", &mut self.enabled);
        w.number("duration_min", &mut self.duration_min, Bounds::new(5, 640));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothButton {
    /// Allow the button to disconnect an active link.
    pub disconnect_permit: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for BluetoothButton {
    fn default() -> Self {
        Self {
            disconnect_permit: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SettingsNode for BluetoothButton {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("disconnect_permit", &mut self.disconnect_permit);
        w.choice("reconnect", &mut self.reconnect);
    }
}

/// Feedback given on a successful read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadNotification {
    pub buzzer: bool,
    pub led: bool,
}

impl Default for ReadNotification {
    fn default() -> Self {
        Self {
            buzzer: true,
            led: true,
        }
    }
}

impl SettingsNode for ReadNotification {
    fn walk<W: Walker>(&mut self, w: &mut W) {
        w.flag("buzzer", &mut self.buzzer);
        w.flag("led", &mut self.led);
    }
}
