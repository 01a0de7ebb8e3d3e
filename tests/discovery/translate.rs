use crate::common::*;
use pagehunt::analysis::AddressTranslator;
use pagehunt::error::PagehuntError;
use pagehunt::io::MappedImage;
use pagehunt::paging::{Level, Profile};

fn vaddr(pml4: u64, pdp: u64, pd: u64, pt: u64, offset: u64) -> u64 {
    (pml4 << 39) | (pdp << 30) | (pd << 21) | (pt << 12) | offset
}

#[test]
fn translates_through_recovered_hierarchies() {
    let file = two_process_image().write_temp();
    let image = MappedImage::open(file.path()).unwrap();
    let t = AddressTranslator::new(&image, Profile::X86_64);

    // A: PML4 0 -> PDP 0 -> PD 0 -> PT 1 -> 0xA000
    assert_eq!(t.translate(ROOT_A, vaddr(0, 0, 0, 1, 0x123)).unwrap(), 0xA123);
    // A: PD 1 maps a 2 MiB page at 0x20_0000.
    let r = t.translate_detailed(ROOT_A, vaddr(0, 0, 1, 7, 0x10)).unwrap();
    assert_eq!(r.level, Level::Middle);
    assert_eq!(r.paddr, 0x20_0000 + (7 << 12) + 0x10);
    // B: PDP 0 maps a 1 GiB page.
    assert_eq!(
        t.translate(ROOT_B, vaddr(0, 0, 3, 4, 5)).unwrap(),
        0x4000_0000 + (3 << 21) + (4 << 12) + 5
    );
    // Kernel half is shared by both roots.
    let kernel = vaddr(511, 0, 0, 0, 0x42);
    assert_eq!(t.translate(ROOT_A, kernel).unwrap(), t.translate(ROOT_B, kernel).unwrap());
    assert_eq!(t.translate(ROOT_A, kernel).unwrap(), 0x9042);
}

#[test]
fn unmapped_addresses_fail_fast() {
    let file = two_process_image().write_temp();
    let image = MappedImage::open(file.path()).unwrap();
    let t = AddressTranslator::new(&image, Profile::X86_64);
    assert!(matches!(
        t.translate(ROOT_A, vaddr(3, 0, 0, 0, 0)),
        Err(PagehuntError::NotMapped {
            level: Level::Top,
            table: ROOT_A,
            ..
        })
    ));
    assert!(matches!(
        t.translate(ROOT_A, vaddr(511, 0, 3, 0, 0)),
        Err(PagehuntError::Memory(_))
    ));
    assert_eq!(t.cached(), 0);
}
