use wire::Timeval;

use super::Ping;

/// Summary of a ping's replies.
///
/// Round-trip statistics use the first reply from the target to each
/// probe; they are `None` when no probe drew one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingStats {
    /// Probes answered by the target.
    pub replies: u32,
    /// Additional replies from the target beyond the first per probe.
    pub dups: u32,
    /// Probes that drew no reply at all.
    pub loss: u32,
    /// Probes answered only by something other than the target.
    pub errors: u32,
    pub min_rtt: Option<Timeval>,
    pub max_rtt: Option<Timeval>,
    pub avg_rtt: Option<Timeval>,
    pub stddev_rtt: Option<Timeval>,
}

impl Ping {
    #[must_use]
    pub fn stats(&self) -> PingStats {
        let mut stats = PingStats::default();
        let mut rtts: Vec<u64> = Vec::new();

        for slot in &self.probes {
            let Some(probe) = slot else {
                stats.loss += 1;
                continue;
            };
            let mut from_target = probe
                .replies
                .iter()
                .filter(|r| self.reply_is_from_target(r));
            match from_target.next() {
                Some(first) => {
                    stats.replies += 1;
                    stats.dups += from_target.count() as u32;
                    rtts.push(u64::from(first.rtt.sec) * 1_000_000 + u64::from(first.rtt.usec));
                }
                None if probe.replies.is_empty() => stats.loss += 1,
                None => stats.errors += 1,
            }
        }

        if rtts.is_empty() {
            return stats;
        }
        let n = rtts.len() as u64;
        let min = rtts.iter().copied().min().unwrap_or(0);
        let max = rtts.iter().copied().max().unwrap_or(0);
        let mean = rtts.iter().sum::<u64>() / n;
        let var = rtts
            .iter()
            .map(|&us| {
                let d = us as f64 - mean as f64;
                d * d
            })
            .sum::<f64>()
            / n as f64;

        stats.min_rtt = Some(micros(min));
        stats.max_rtt = Some(micros(max));
        stats.avg_rtt = Some(micros(mean));
        stats.stddev_rtt = Some(micros(var.sqrt().round() as u64));
        stats
    }
}

fn micros(us: u64) -> Timeval {
    Timeval::new((us / 1_000_000) as u32, (us % 1_000_000) as u32)
}
