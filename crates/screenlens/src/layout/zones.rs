//! Screen-zone partitioning derived from detected structures.
//!
//! `main` always exists. A header zone appears when a top navbar or any
//! header lines were found, a sidebar when middle-position navbars exist,
//! a footer when a bottom navbar exists. Zones never overlap and together
//! cover the screen exactly.

use crate::types::{NavbarPosition, ScreenDimensions, Structures, Zone, Zones};

/// Fraction of screen height taken by the header zone when present.
const HEADER_FRACTION: f64 = 0.08;
/// Fraction of screen width taken by the sidebar zone when present.
const SIDEBAR_FRACTION: f64 = 0.18;
/// Fraction of screen height taken by the footer zone when present.
const FOOTER_FRACTION: f64 = 0.07;

/// Derive the zone partition for the given structures and screen size.
pub fn derive_zones(structures: &Structures, dims: ScreenDimensions) -> Zones {
    let width = dims.width as f64;
    let height = dims.height as f64;

    let has_header = structures
        .navbars
        .iter()
        .any(|n| n.position == NavbarPosition::Top)
        || !structures.headers.is_empty();
    let has_sidebar = structures
        .navbars
        .iter()
        .any(|n| n.position == NavbarPosition::Middle);
    let has_footer = structures
        .navbars
        .iter()
        .any(|n| n.position == NavbarPosition::Bottom);

    let header_h = if has_header {
        (height * HEADER_FRACTION).round()
    } else {
        0.0
    };
    let footer_h = if has_footer {
        (height * FOOTER_FRACTION).round()
    } else {
        0.0
    };
    let sidebar_w = if has_sidebar {
        (width * SIDEBAR_FRACTION).round()
    } else {
        0.0
    };
    let body_h = height - header_h - footer_h;

    Zones {
        header: has_header.then(|| Zone {
            x: 0.0,
            y: 0.0,
            w: width,
            h: header_h,
        }),
        sidebar: has_sidebar.then(|| Zone {
            x: 0.0,
            y: header_h,
            w: sidebar_w,
            h: body_h,
        }),
        main: Zone {
            x: sidebar_w,
            y: header_h,
            w: width - sidebar_w,
            h: body_h,
        },
        footer: has_footer.then(|| Zone {
            x: 0.0,
            y: height - footer_h,
            w: width,
            h: footer_h,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HeaderLine, NavbarStructure};

    fn dims() -> ScreenDimensions {
        ScreenDimensions::new(2880, 1800)
    }

    fn navbar(position: NavbarPosition) -> NavbarStructure {
        NavbarStructure {
            line: 0,
            items: vec!["home".into(), "about".into(), "contact".into()],
            position,
            bbox: None,
        }
    }

    fn zone_area(z: &Zone) -> f64 {
        z.w * z.h
    }

    #[test]
    fn main_only_when_no_structures() {
        let zones = derive_zones(&Structures::default(), dims());
        assert!(zones.header.is_none());
        assert!(zones.sidebar.is_none());
        assert!(zones.footer.is_none());
        assert_eq!(zones.main.w, 2880.0);
        assert_eq!(zones.main.h, 1800.0);
    }

    #[test]
    fn top_navbar_creates_header_zone() {
        let structures = Structures {
            navbars: vec![navbar(NavbarPosition::Top)],
            ..Default::default()
        };
        let zones = derive_zones(&structures, dims());
        let header = zones.header.unwrap();
        assert_eq!(header.h, 144.0);
        assert_eq!(zones.main.y, 144.0);
        assert_eq!(zones.main.h, 1800.0 - 144.0);
    }

    #[test]
    fn headers_alone_create_header_zone() {
        let structures = Structures {
            headers: vec![HeaderLine {
                line: 0,
                text: "TITLE".into(),
                level: 1,
                bbox: None,
            }],
            ..Default::default()
        };
        assert!(derive_zones(&structures, dims()).header.is_some());
    }

    #[test]
    fn all_zones_cover_screen_without_overlap() {
        let structures = Structures {
            navbars: vec![
                navbar(NavbarPosition::Top),
                navbar(NavbarPosition::Middle),
                navbar(NavbarPosition::Bottom),
            ],
            ..Default::default()
        };
        let zones = derive_zones(&structures, dims());
        let header = zones.header.unwrap();
        let sidebar = zones.sidebar.unwrap();
        let footer = zones.footer.unwrap();

        let total = zone_area(&header) + zone_area(&sidebar) + zone_area(&footer)
            + zone_area(&zones.main);
        assert_eq!(total, 2880.0 * 1800.0);

        // Seams line up exactly.
        assert_eq!(sidebar.y, header.h);
        assert_eq!(zones.main.x, sidebar.w);
        assert_eq!(sidebar.h, zones.main.h);
        assert_eq!(footer.y, header.h + zones.main.h);
    }

    #[test]
    fn middle_navbar_creates_sidebar() {
        let structures = Structures {
            navbars: vec![NavbarStructure {
                line: 7,
                items: vec!["settings".into(), "profile".into(), "account".into()],
                position: NavbarPosition::Middle,
                bbox: None,
            }],
            ..Default::default()
        };
        let zones = derive_zones(&structures, dims());
        let sidebar = zones.sidebar.unwrap();
        assert_eq!(sidebar.w, (2880.0_f64 * 0.18).round());
        assert_eq!(zones.main.x, sidebar.w);
    }
}
