use serde::ser::SerializeTuple;

// geo stores points as (x = longitude, y = latitude), output files list
// latitude first
pub fn serialize_point<S>(this: &geo::Point<f64>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    let mut serializer = serializer.serialize_tuple(2)?;
    serializer.serialize_element(&this.y())?;
    serializer.serialize_element(&this.x())?;
    serializer.end()
}

/// A missing point is written as an empty list.
pub fn serialize_opt_point<S>(
    this: &Option<geo::Point<f64>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::ser::Serializer,
{
    match this {
        Some(point) => serialize_point(point, serializer),
        None => serializer.serialize_tuple(0)?.end(),
    }
}
