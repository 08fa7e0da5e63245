use snitch_vision::scanner::{Calibration, ScanParams, ThreatScanner, BRIGHTNESS_FLOOR};
use snitch_vision::Frame;

#[test]
fn dark_block_in_top_right_cell() {
    let scanner = ThreatScanner::with_baseline(ScanParams::default(), 60);
    assert_eq!(scanner.dynamic_threshold(), 10);

    // Top-right cell spans x 106..160, y 0..40; a 50x40 block centred in it.
    let mut frame = Frame::filled(200);
    frame.fill_rect(108, 0, 50, 40, 5);

    let t = scanner.scan(Some(&frame));
    assert!(t.active);
    assert_eq!(t.zone, Some(2));
    assert_eq!(t.mass, 50 * 40);
}

#[test]
fn block_straddling_cells_counts_per_cell() {
    let scanner = ThreatScanner::with_baseline(ScanParams::default(), 60);
    let mut frame = Frame::filled(200);
    // 30 columns left of x=106 (zone 1), 24 columns right of it (zone 2).
    frame.fill_rect(76, 0, 54, 40, 5);

    let t = scanner.scan(Some(&frame));
    assert_eq!(t.zone, Some(1));
    assert_eq!(t.mass, 30 * 40);
    assert!(t.active);
}

#[test]
fn dark_room_calibrates_to_floor() {
    let cal = Calibration::from_frame(&Frame::filled(30), BRIGHTNESS_FLOOR);
    assert_eq!(cal.baseline, 40);
    let scanner = ThreatScanner::new(ScanParams::default(), &cal);
    assert_eq!(scanner.dynamic_threshold(), 40);

    let mut frame = Frame::filled(200);
    frame.fill_rect(60, 45, 30, 30, 35);
    let t = scanner.scan(Some(&frame));
    assert!(t.active);
    assert_eq!((t.zone, t.mass), (Some(4), 900));
}

#[test]
fn active_zone_is_always_on_the_grid() {
    let scanner = ThreatScanner::with_baseline(ScanParams::default(), 200);
    for seed in 0u32..32 {
        let data: Vec<u8> = (0..160 * 120u32)
            .map(|i| (i.wrapping_mul(2654435761).wrapping_add(seed * 97) >> 13) as u8)
            .collect();
        let frame = Frame::new(160, 120, data).unwrap();
        let t = scanner.scan(Some(&frame));
        if t.active {
            assert!((0..=8).contains(&t.zone_index()));
        }
        if t.mass == 0 {
            assert_eq!(t.zone_index(), -1);
        }
    }
}
