/// A campus whose weather is tracked, located by its forecast coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct University {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub enrollment: u32,
}

/// NCAA Division I football universities in Missouri
pub const MISSOURI_UNIVERSITIES: [University; 6] = [
    University {
        name: "University of Missouri - Columbia",
        latitude: 38.94,
        longitude: -92.33,
        enrollment: 27970,
    },
    University {
        name: "Missouri State University - Springfield",
        latitude: 37.20,
        longitude: -93.28,
        enrollment: 27235,
    },
    University {
        name: "Lindenwood University",
        latitude: 38.79,
        longitude: -90.50,
        enrollment: 7288,
    },
    University {
        name: "Southeast Missouri State University -SEMO",
        latitude: 37.31,
        longitude: -89.53,
        enrollment: 9500,
    },
    University {
        name: "University of Missouri - KC",
        latitude: 39.0333,
        longitude: -94.58,
        enrollment: 14904,
    },
    University {
        name: "Saint Louis University - SLU",
        latitude: 38.6359,
        longitude: -90.2341,
        enrollment: 17082,
    },
];

/// Largest coordinate offset (degrees) still matched to a campus.
///
/// Forecast grids snap requested coordinates to the nearest cell, so the
/// returned location rarely equals the requested one exactly.
pub const MAX_LOCATION_OFFSET: f64 = 0.25;

/// Returns the campus closest to the given coordinates, if one lies within
/// `max_degrees` on both axes.
pub fn nearest(latitude: f64, longitude: f64, max_degrees: f64) -> Option<&'static University> {
    MISSOURI_UNIVERSITIES
        .iter()
        .filter(|u| {
            (u.latitude - latitude).abs() <= max_degrees
                && (u.longitude - longitude).abs() <= max_degrees
        })
        .min_by(|a, b| {
            distance_sq(a, latitude, longitude).total_cmp(&distance_sq(b, latitude, longitude))
        })
}

fn distance_sq(university: &University, latitude: f64, longitude: f64) -> f64 {
    (university.latitude - latitude).powi(2) + (university.longitude - longitude).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_names_are_unique() {
        for (i, a) in MISSOURI_UNIVERSITIES.iter().enumerate() {
            assert!(MISSOURI_UNIVERSITIES[i + 1..].iter().all(|b| b.name != a.name));
        }
    }

    #[test]
    fn snapped_grid_coordinates_resolve_to_campus() {
        // Open-Meteo answers a request for 38.94,-92.33 with its grid cell centre
        let mizzou = nearest(38.937_416, -92.319_15, MAX_LOCATION_OFFSET).unwrap();
        assert_eq!(mizzou.name, "University of Missouri - Columbia");
    }

    #[test]
    fn st_louis_campuses_are_told_apart() {
        let slu = nearest(38.64, -90.23, MAX_LOCATION_OFFSET).unwrap();
        assert_eq!(slu.name, "Saint Louis University - SLU");
        let lindenwood = nearest(38.78, -90.49, MAX_LOCATION_OFFSET).unwrap();
        assert_eq!(lindenwood.name, "Lindenwood University");
    }

    #[test]
    fn far_away_coordinates_do_not_match() {
        assert!(nearest(40.71, -74.0, MAX_LOCATION_OFFSET).is_none());
    }
}
