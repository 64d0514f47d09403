//! Generic conformance assertions for [`Media`] implementations.
//!
//! These helpers validate invariants every media should satisfy
//! regardless of its underlying link (UDP, loopback, a real bus driver).
//!
//! # Usage
//!
//! ```rust,ignore
//! use meridian_media::testing;
//!
//! let mut media = MyMedia::open(config)?;
//! testing::assert_has_name(&media);
//! testing::assert_mtu_in_range(&media);
//! testing::assert_idle_receive_is_none(&mut media);
//! ```

use meridian_core::MTU_MAX;

use crate::traits::Media;

/// Assert that the media has a non-empty name.
pub fn assert_has_name(media: &impl Media) {
    assert!(!media.name().is_empty(), "media name must not be empty");
}

/// Assert that the advertised MTU leaves room for at least one data byte
/// plus the tail byte, and fits the largest supported frame.
pub fn assert_mtu_in_range(media: &impl Media) {
    let mtu = media.mtu();
    assert!(
        (2..=MTU_MAX).contains(&mtu),
        "media MTU {mtu} outside 2..={MTU_MAX}"
    );
}

/// Assert that a zero-timeout receive on an idle media returns `Ok(None)`
/// rather than blocking or erroring.
pub fn assert_idle_receive_is_none(media: &mut impl Media) {
    let result = media.receive(0);
    match result {
        Ok(None) => {}
        Ok(Some(_)) => panic!("idle media unexpectedly produced a frame"),
        Err(e) => panic!("idle receive must not error: {e}"),
    }
}

/// Run every conformance check applicable to a freshly opened media.
pub fn assert_conformance(media: &mut impl Media) {
    assert_has_name(media);
    assert_mtu_in_range(media);
    assert!(media.is_open(), "freshly opened media should report open");
    assert_idle_receive_is_none(media);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackMedia;
    use crate::udp::{UdpConfig, UdpMedia};

    #[test]
    fn test_loopback_conformance() {
        let mut media = LoopbackMedia::new("loop");
        assert_conformance(&mut media);
    }

    #[test]
    fn test_udp_conformance() {
        let config = UdpConfig::receive_only("udp", "127.0.0.1:0".parse().unwrap());
        let mut media = UdpMedia::open(config).unwrap();
        assert_conformance(&mut media);
    }
}
