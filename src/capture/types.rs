/// Detailed control over a capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Network interfaces to capture from; empty means all interfaces of the
    /// capture target.
    pub nifs: Vec<String>,
    /// Packet capture filter expression, in pcap-filter syntax; empty means
    /// no filtering.
    pub filter: String,
    /// Try to avoid switching into promiscuous mode. Other captures may
    /// already have switched it on, so this cannot force it off.
    pub avoid_promiscuous_mode: bool,
}

impl CaptureOptions {
    /// The interfaces to capture from: the explicitly requested ones, else
    /// the target's known ones, else "all".
    pub fn effective_nifs(&self, target_nifs: &[String]) -> Vec<String> {
        if !self.nifs.is_empty() {
            self.nifs.clone()
        } else if !target_nifs.is_empty() {
            target_nifs.to_vec()
        } else {
            vec![ALL_NIFS.to_string()]
        }
    }
}

/// Interface list value asking for all network interfaces of a target.
pub const ALL_NIFS: &str = "all";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_nifs() {
        let target_nifs = vec!["eth0".to_string(), "lo".to_string()];
        let mut opts = CaptureOptions::default();
        assert_eq!(opts.effective_nifs(&[]), vec!["all"]);
        assert_eq!(opts.effective_nifs(&target_nifs), target_nifs);
        opts.nifs = vec!["eth1".to_string()];
        assert_eq!(opts.effective_nifs(&target_nifs), vec!["eth1"]);
    }
}
