use strum_macros::Display;

/// Named change events. Receivers re-read the property; nothing else is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PropertyChange {
    #[strum(to_string = "radSpotmeterInKelvinX100")]
    RadSpotmeterInKelvinX100,
    #[strum(to_string = "radSpotmeterRoi")]
    RadSpotmeterRoi,
    #[strum(to_string = "auxAmbientTemperature")]
    AuxAmbientTemperature,
    #[strum(to_string = "auxObjectTemperature")]
    AuxObjectTemperature,
    #[strum(to_string = "auxSensorAvailable")]
    AuxSensorAvailable,
}

pub trait PropertyObserver: Send + Sync {
    fn property_changed(&self, change: PropertyChange);
}

impl<F> PropertyObserver for F
where
    F: Fn(PropertyChange) + Send + Sync,
{
    fn property_changed(&self, change: PropertyChange) {
        self(change)
    }
}
