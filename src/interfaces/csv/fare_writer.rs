use crate::domain::fare::Fare;
use crate::error::Result;
use std::io::Write;

/// Writes fares as CSV, one row per fare, with a header row.
pub struct FareWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> FareWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_fares(&mut self, fares: impl IntoIterator<Item = Fare>) -> Result<()> {
        for fare in fares {
            self.writer.serialize(fare)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
