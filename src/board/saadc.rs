//! Battery sampling through the SAADC.
//!
//! VDD is measured on the internal channel: gain 1/6 with the 0.6 V
//! reference gives a 3.6 V full scale at 12 bits.

use embassy_futures::block_on;
use embassy_nrf::saadc::Saadc;
use proxtag::{AnalogSampler, SampleError};

pub struct SaadcSampler {
    saadc: Saadc<'static, 1>,
}

impl SaadcSampler {
    pub fn new(saadc: Saadc<'static, 1>) -> Self {
        Self { saadc }
    }
}

impl AnalogSampler for SaadcSampler {
    fn setup(&mut self) -> Result<(), SampleError> {
        block_on(self.saadc.calibrate());
        Ok(())
    }

    fn sample(&mut self) -> Result<i16, SampleError> {
        let mut buf = [0i16; 1];
        block_on(self.saadc.sample(&mut buf));
        Ok(buf[0])
    }
}
