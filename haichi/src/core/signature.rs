use std::collections::HashMap;

use super::{LiveDisplay, Point};
use crate::macos::DisplayId;

const SIGNATURE_DELIMITER: &str = ",";

/// Topology fingerprint: the sorted `vendor:model` multiset of the displays.
/// Independent of enumeration order; duplicates are preserved.
pub fn signature(displays: &[LiveDisplay]) -> String {
    let mut parts: Vec<String> = displays
        .iter()
        .map(|d| format!("{}:{}", d.vendor, d.model))
        .collect();
    parts.sort();
    parts.join(SIGNATURE_DELIMITER)
}

/// Origin of the display the OS reports as main, if exactly one is.
pub fn main_origin(displays: &[LiveDisplay]) -> Option<Point> {
    let mut mains = displays.iter().filter(|d| d.is_main);
    let main = mains.next()?;
    if mains.next().is_some() {
        return None;
    }
    Some(main.origin())
}

/// Main-relative coordinates for every display.
pub fn normalize(displays: &[LiveDisplay], main_origin: Point) -> HashMap<DisplayId, Point> {
    displays
        .iter()
        .map(|d| {
            (
                d.id,
                Point::new(d.bounds.x - main_origin.x, d.bounds.y - main_origin.y),
            )
        })
        .collect()
}

/// `normalize` against whichever display is currently main.
pub fn normalize_to_main(displays: &[LiveDisplay]) -> Option<HashMap<DisplayId, Point>> {
    main_origin(displays).map(|origin| normalize(displays, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::create_test_display;

    #[test]
    fn test_signature_is_order_independent() {
        let a = create_test_display(1, 0, 0, 1512, 982).with_hardware(1552, 41001);
        let b = create_test_display(2, 1512, 0, 1920, 1080).with_hardware(4268, 16560);
        let c = create_test_display(3, -1920, 0, 1920, 1080).with_hardware(4268, 16560);

        let forward = signature(&[a.clone(), b.clone(), c.clone()]);
        let reversed = signature(&[c, b, a]);
        assert_eq!(forward, reversed);
        assert_eq!(forward, "1552:41001,4268:16560,4268:16560");
    }

    #[test]
    fn test_signature_distinguishes_count() {
        let a = create_test_display(1, 0, 0, 1920, 1080).with_hardware(4268, 16560);
        let b = create_test_display(2, 1920, 0, 1920, 1080).with_hardware(4268, 16560);
        assert_ne!(signature(&[a.clone()]), signature(&[a, b]));
        assert_eq!(signature(&[]), "");
    }

    #[test]
    fn test_normalize_relative_to_main() {
        let displays = vec![
            create_test_display(1, 0, 0, 1512, 982),
            create_test_display(2, 1512, -98, 1920, 1080),
        ];
        let mut moved = displays.clone();
        // Same arrangement, main shifted in global space
        for d in &mut moved {
            d.bounds.x += 100;
            d.bounds.y += 50;
        }

        let positions = normalize_to_main(&moved).unwrap();
        assert_eq!(positions[&1], Point::new(0, 0));
        assert_eq!(positions[&2], Point::new(1512, -98));
        assert_eq!(positions, normalize_to_main(&displays).unwrap());
    }

    #[test]
    fn test_main_origin_requires_single_main() {
        let mut a = create_test_display(1, 0, 0, 1920, 1080);
        let mut b = create_test_display(2, 1920, 0, 1920, 1080);
        assert!(main_origin(&[a.clone(), b.clone()]).is_some());

        a.is_main = false;
        assert!(main_origin(&[a.clone(), b.clone()]).is_none());

        a.is_main = true;
        b.is_main = true;
        assert!(main_origin(&[a, b]).is_none());
    }
}
