use super::cmd::{Pitch, UserCmd};

/// 16-bit view angles as the receiver tracks them between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewAngles {
    pub yaw: i16,
    pub pitch: i16,
}

impl ViewAngles {
    pub fn new(yaw: i16, pitch: i16) -> Self {
        Self { yaw, pitch }
    }

    /// Absolute fields replace, deltas add on top, absent fields hold.
    pub fn apply(&mut self, cmd: &UserCmd) {
        if let Some(angle) = cmd.angle {
            self.yaw = angle;
        }
        match cmd.pitch {
            Some(Pitch::Absolute(pitch)) => self.pitch = pitch,
            Some(Pitch::CenterView) => self.pitch = 0,
            None => {}
        }
        if let Some(delta) = cmd.delta {
            self.yaw = self.yaw.wrapping_add(delta.yaw_units());
            self.pitch = self.pitch.wrapping_add(delta.pitch_units());
        }
    }

    pub fn yaw_degrees(self) -> f32 {
        self.yaw as u16 as f32 * 360.0 / 65536.0
    }

    pub fn pitch_degrees(self) -> f32 {
        self.pitch as f32 * 360.0 / 65536.0
    }
}
