pub const TIMER_CHANNELS: usize = 3;
pub const TIMER_CHANNEL_STRIDE: u32 = 0x10;

pub const TIMER_CTRL_ENABLE: u32 = 0x01;
pub const TIMER_CTRL_COUNT_DOWN: u32 = 0x02;
pub const TIMER_CTRL_REPEAT: u32 = 0x04;
pub const TIMER_CTRL_IRQ_ENABLE: u32 = 0x08;
pub const TIMER_CTRL_EXTERNAL: u32 = 0x10;
const TIMER_CTRL_SCALE_SHIFT: u32 = 5;

pub const TIMER_STAT_COMPARE: u32 = 0x01;
pub const TIMER_STAT_OVERFLOW: u32 = 0x02;

#[derive(Clone, Copy, bincode::Encode, bincode::Decode)]
struct TimerChannel {
    count: u32,
    ctrl: u32,
    cmp: u32,
    stat: u32,
    /// Advance units owed to this channel but not yet converted into ticks.
    pending: u64,
}

impl TimerChannel {
    fn new() -> Self {
        Self {
            count: 0,
            ctrl: 0,
            cmp: 0,
            stat: 0,
            pending: 0,
        }
    }

    fn enabled(&self) -> bool {
        self.ctrl & TIMER_CTRL_ENABLE != 0
    }

    fn scale(&self) -> u32 {
        (self.ctrl >> TIMER_CTRL_SCALE_SHIFT) & 0x07
    }

    /// One logical tick: counter arithmetic first, then the compare check, so
    /// a channel armed with COUNT == CMP still needs a full tick to fire.
    fn tick(&mut self) -> bool {
        if self.ctrl & TIMER_CTRL_COUNT_DOWN != 0 {
            if self.count == 0 {
                self.stat |= TIMER_STAT_OVERFLOW;
                if self.ctrl & TIMER_CTRL_REPEAT != 0 {
                    self.count = self.cmp;
                } else {
                    self.ctrl &= !TIMER_CTRL_ENABLE;
                }
            } else {
                self.count -= 1;
            }
        } else {
            self.count = self.count.wrapping_add(1);
            if self.count == 0 {
                self.stat |= TIMER_STAT_OVERFLOW;
            }
        }

        if self.count == self.cmp {
            self.stat |= TIMER_STAT_COMPARE;
            if self.ctrl & TIMER_CTRL_REPEAT == 0 {
                self.ctrl &= !TIMER_CTRL_ENABLE;
            }
            return self.ctrl & TIMER_CTRL_IRQ_ENABLE != 0;
        }
        false
    }
}

/// Three independent 32-bit timer channels at strides of 0x10:
/// COUNT @ +0x00, CTRL @ +0x04, CMP @ +0x08, STAT @ +0x0C.
///
/// `advance` consumes *instruction units*: the engine charges four cycles per
/// instruction and divides by four before calling in, so one logical tick
/// costs 2^scale units = 4·2^scale engine cycles.  A channel with scale 0 and
/// CMP = 100 therefore fires after 400 engine cycles.
#[derive(Clone, bincode::Encode, bincode::Decode)]
pub struct TimerBlock {
    channels: [TimerChannel; TIMER_CHANNELS],
}

impl Default for TimerBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBlock {
    pub fn new() -> Self {
        Self {
            channels: [TimerChannel::new(); TIMER_CHANNELS],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed `units` advance units to every enabled channel and drain whole
    /// ticks.  Returns `true` when any channel hit compare with IRQ enabled.
    pub fn advance(&mut self, units: u64) -> bool {
        let mut fired = false;
        for channel in self.channels.iter_mut() {
            if !channel.enabled() || channel.ctrl & TIMER_CTRL_EXTERNAL != 0 {
                continue;
            }
            channel.pending += units;
            let period = 1u64 << channel.scale();
            while channel.pending >= period {
                channel.pending -= period;
                if channel.tick() {
                    fired = true;
                }
                if !channel.enabled() {
                    channel.pending = 0;
                    break;
                }
            }
        }
        fired
    }

    pub fn read_reg(&mut self, offset: u32) -> u32 {
        let Some(channel) = self.channel(offset) else {
            return 0;
        };
        match offset & 0x0C {
            0x00 => channel.count,
            0x04 => channel.ctrl,
            0x08 => channel.cmp,
            _ => channel.stat,
        }
    }

    pub fn write_reg(&mut self, offset: u32, value: u32) {
        let Some(channel) = self.channel(offset) else {
            return;
        };
        match offset & 0x0C {
            0x00 => channel.count = value,
            0x04 => {
                let was_enabled = channel.enabled();
                channel.ctrl = value & 0xFF;
                if channel.enabled() && !was_enabled {
                    channel.pending = 0;
                }
            }
            0x08 => channel.cmp = value,
            // STAT bits are write-1-to-clear.
            _ => channel.stat &= !(value & (TIMER_STAT_COMPARE | TIMER_STAT_OVERFLOW)),
        }
    }

    fn channel(&mut self, offset: u32) -> Option<&mut TimerChannel> {
        let index = (offset / TIMER_CHANNEL_STRIDE) as usize;
        self.channels.get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_channel(block: &mut TimerBlock, index: u32, ctrl: u32, cmp: u32) {
        let base = index * TIMER_CHANNEL_STRIDE;
        block.write_reg(base + 0x00, 0);
        block.write_reg(base + 0x08, cmp);
        block.write_reg(base + 0x04, ctrl);
    }

    #[test]
    fn count_up_fires_after_cmp_times_scale_units() {
        for scale in [0u32, 1, 3, 7] {
            let mut block = TimerBlock::new();
            let cmp = 100u64;
            armed_channel(
                &mut block,
                0,
                TIMER_CTRL_ENABLE | TIMER_CTRL_IRQ_ENABLE | (scale << TIMER_CTRL_SCALE_SHIFT),
                cmp as u32,
            );

            let needed = cmp << scale;
            assert!(
                !block.advance(needed - 1),
                "scale {scale}: fired one unit early"
            );
            assert!(block.advance(1), "scale {scale}: did not fire on time");
            assert_eq!(block.read_reg(0x0C) & TIMER_STAT_COMPARE, TIMER_STAT_COMPARE);

            // Non-repeat channels disarm after the hit; no second IRQ.
            assert!(!block.advance(needed * 4));
            assert_eq!(block.read_reg(0x04) & TIMER_CTRL_ENABLE, 0);
        }
    }

    #[test]
    fn armed_with_count_equal_cmp_still_needs_one_tick() {
        let mut block = TimerBlock::new();
        block.write_reg(0x00, 7);
        block.write_reg(0x08, 7);
        block.write_reg(0x04, TIMER_CTRL_ENABLE | TIMER_CTRL_IRQ_ENABLE | TIMER_CTRL_REPEAT);

        assert_eq!(block.read_reg(0x0C), 0);
        // The first tick moves COUNT to 8, so the compare does not hit until
        // the counter wraps all the way around.
        assert!(!block.advance(1));
        assert_eq!(block.read_reg(0x00), 8);
    }

    #[test]
    fn repeat_channel_fires_every_period() {
        let mut block = TimerBlock::new();
        armed_channel(
            &mut block,
            1,
            TIMER_CTRL_ENABLE | TIMER_CTRL_IRQ_ENABLE | TIMER_CTRL_REPEAT | TIMER_CTRL_COUNT_DOWN,
            5,
        );
        let base = TIMER_CHANNEL_STRIDE;
        // Counter starts at 0: the first tick wraps, reloads from CMP and
        // immediately satisfies the compare.
        assert!(block.advance(1));
        assert_eq!(block.read_reg(base) & 0xFF, 5);
        let stat = block.read_reg(base + 0x0C);
        assert_eq!(stat, TIMER_STAT_COMPARE | TIMER_STAT_OVERFLOW);

        // Clear and count 5 down to zero, then wrap-reload fires again.
        block.write_reg(base + 0x0C, stat);
        assert_eq!(block.read_reg(base + 0x0C), 0);
        assert!(!block.advance(5));
        assert_eq!(block.read_reg(base), 0);
        assert!(block.advance(1));
    }

    #[test]
    fn count_up_wrap_sets_overflow() {
        let mut block = TimerBlock::new();
        block.write_reg(0x00, u32::MAX);
        block.write_reg(0x08, 1234);
        block.write_reg(0x04, TIMER_CTRL_ENABLE);
        block.advance(1);
        assert_eq!(block.read_reg(0x00), 0);
        assert_eq!(block.read_reg(0x0C) & TIMER_STAT_OVERFLOW, TIMER_STAT_OVERFLOW);
    }

    #[test]
    fn stat_bits_clear_write_one_to_clear() {
        let mut block = TimerBlock::new();
        block.write_reg(0x00, u32::MAX);
        block.write_reg(0x08, 0);
        block.write_reg(0x04, TIMER_CTRL_ENABLE | TIMER_CTRL_REPEAT);
        block.advance(1); // wrap to 0 == CMP: overflow + compare
        assert_eq!(block.read_reg(0x0C), TIMER_STAT_COMPARE | TIMER_STAT_OVERFLOW);

        block.write_reg(0x0C, TIMER_STAT_OVERFLOW);
        assert_eq!(block.read_reg(0x0C), TIMER_STAT_COMPARE);
        block.write_reg(0x0C, TIMER_STAT_COMPARE);
        assert_eq!(block.read_reg(0x0C), 0);
    }

    #[test]
    fn external_clock_channels_ignore_engine_advance() {
        let mut block = TimerBlock::new();
        armed_channel(
            &mut block,
            2,
            TIMER_CTRL_ENABLE | TIMER_CTRL_EXTERNAL | TIMER_CTRL_IRQ_ENABLE,
            1,
        );
        assert!(!block.advance(1000));
        assert_eq!(block.read_reg(2 * TIMER_CHANNEL_STRIDE), 0);
    }
}
