//! Station MAC address policy: fixed addresses and the `randomOui` generator.

use crate::model::MacAddr;
use rand::RngCore;

/// Locally-administered OUIs belonging to common virtualization stacks.
/// `spec.md` calls for a random OUI without enumerating one; these are
/// picked because a scan/associate daemon is routinely run inside a VM
/// during development and testing, where a vendor-looking prefix avoids
/// colliding with a real NIC on the same network.
pub const VIRTUALIZATION_OUIS: &[[u8; 3]] = &[
    [0x00, 0x50, 0x56], // VMware
    [0x08, 0x00, 0x27], // VirtualBox
    [0x52, 0x54, 0x00], // QEMU/KVM
    [0x00, 0x16, 0x3e], // Xen
    [0x00, 0x15, 0x5d], // Hyper-V
];

/// Builds a random MAC from one of [`VIRTUALIZATION_OUIS`] with a random
/// host part, using `rng` so callers can make the choice deterministic in
/// tests.
pub fn random_oui_mac(rng: &mut impl RngCore) -> MacAddr {
    let oui = VIRTUALIZATION_OUIS[(rng.next_u32() as usize) % VIRTUALIZATION_OUIS.len()];
    let mut addr = [0u8; 6];
    addr[..3].copy_from_slice(&oui);
    rng.fill_bytes(&mut addr[3..]);
    MacAddr(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_mac_always_has_a_known_oui() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mac = random_oui_mac(&mut rng);
            let oui = [mac.0[0], mac.0[1], mac.0[2]];
            assert!(VIRTUALIZATION_OUIS.contains(&oui));
        }
    }
}
