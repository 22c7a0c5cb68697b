//! Generic sensor driver trait.
//! Keeps a consistent interface for drivers that provide raw + parsed data.

pub trait SensorDriver {
    type RawData;
    type ParsedData;
    type Error;

    fn read_raw(&mut self) -> Result<Self::RawData, Self::Error>;
    fn parse(&self, raw: Self::RawData) -> Result<Self::ParsedData, Self::Error>;

    /// `read_raw` followed by `parse`.
    fn read(&mut self) -> Result<Self::ParsedData, Self::Error> {
        let raw = self.read_raw()?;
        self.parse(raw)
    }
}
