use std::fmt;
use std::str::FromStr;

pub const CHANNEL_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Water = 0,
    Gas = 1,
}

impl ChannelId {
    pub const ALL: [ChannelId; CHANNEL_COUNT] = [ChannelId::Water, ChannelId::Gas];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Water => "water",
            ChannelId::Gas => "gas",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelId {
    type Err = ();

    /// Accepts the channel name or its index ("water", "w", "0", ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "water" | "w" | "0" => Ok(ChannelId::Water),
            "gas" | "g" | "1" => Ok(ChannelId::Gas),
            _ => Err(()),
        }
    }
}

/// Presentation metadata of a channel, fixed at build time.
#[derive(Debug, Clone)]
pub struct ChannelSpec {
    pub label: &'static str,
    pub unit: &'static str,

    /// Multiplier from pulses to `unit`
    pub unit_factor: f64,

    pub unit_decimal_places: usize,
}

impl ChannelSpec {
    pub fn for_channel(id: ChannelId) -> Self {
        match id {
            // 1 pulse = 1 liter
            ChannelId::Water => Self {
                label: "Water",
                unit: "m³",
                unit_factor: 0.001,
                unit_decimal_places: 3,
            },
            // 1 pulse = 10 liters
            ChannelId::Gas => Self {
                label: "Gas",
                unit: "m³",
                unit_factor: 0.01,
                unit_decimal_places: 2,
            },
        }
    }

    /// Render a pulse count the way it is reported to sinks
    pub fn format_value(&self, pulses: u32) -> String {
        let scaled = pulses as f64 * self.unit_factor;
        format!("{:.*}", self.unit_decimal_places, scaled)
    }
}
