/// Native reference system of a terrain tile. Only WGS84 based systems are
/// supported, so no datum shift is ever needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crs {
    /// Longitude and latitude in degrees
    Geographic,

    /// Easting and northing in meters
    Utm { zone: u8, north: bool },
}

const FALSE_NORTHING_SOUTH: f64 = 10_000_000.;

impl Crs {
    pub fn from_epsg(code: u16) -> Option<Self> {
        match code {
            4326 => Some(Crs::Geographic),
            32601..=32660 => Some(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Some(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => None,
        }
    }

    /// Converts native coordinates to `(lon, lat)` in degrees. Northings
    /// past the equator are accepted in either hemisphere.
    pub fn to_geographic(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        match *self {
            Crs::Geographic => Some((x, y)),
            Crs::Utm { zone, north } => {
                // utm only takes northings of the letter's own hemisphere
                let (northing, north) = match (north, y) {
                    (true, y) if y < 0. => (y + FALSE_NORTHING_SOUTH, false),
                    (false, y) if y > FALSE_NORTHING_SOUTH => (y - FALSE_NORTHING_SOUTH, true),
                    _ => (y, north),
                };

                // the letter only selects the hemisphere
                let letter = if north { 'N' } else { 'M' };
                utm::wsg84_utm_to_lat_lon(x, northing, zone, letter)
                    .ok()
                    .map(|(lat, lon)| (lon, lat))
            }
        }
    }

    /// Converts `(lon, lat)` in degrees to native coordinates.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match *self {
            Crs::Geographic => (lon, lat),
            Crs::Utm { zone, north } => {
                let (northing, easting, _) = utm::to_utm_wgs84(lat, lon, zone);

                // to_utm_wgs84 picks the false northing from the sign of the
                // latitude, the tile's zone definition decides here
                let northing = match (north, lat < 0.) {
                    (true, true) => northing - FALSE_NORTHING_SOUTH,
                    (false, false) => northing + FALSE_NORTHING_SOUTH,
                    _ => northing,
                };

                (easting, northing)
            }
        }
    }
}
