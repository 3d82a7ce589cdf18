use super::simulated::{NoDevice, SimulatedDevice};
use super::*;

#[test]
fn simulated_device_runs_reference_kernels() {
    let dev = SimulatedDevice::new();
    let mut buf = dev.upload(&[1.0, 2.0]).unwrap();
    dev.dispatch(&mut buf, &Kernel::Gain { factor: 3.0 }).unwrap();
    assert_eq!(dev.download(&buf).unwrap(), vec![3.0, 6.0]);
    assert_eq!(dev.uploads(), 1);
    assert_eq!(dev.dispatches(), 1);
}

#[test]
fn injected_faults_surface_as_device_errors() {
    let dev = SimulatedDevice::new().fail_dispatch_after(1);
    let mut buf = dev.upload(&[1.0]).unwrap();
    assert!(dev.dispatch(&mut buf, &Kernel::Gain { factor: 2.0 }).is_ok());
    let err = dev
        .dispatch(&mut buf, &Kernel::Gain { factor: 2.0 })
        .unwrap_err();
    assert!(matches!(err, DeviceError::Kernel { kernel: "gain", .. }));

    let dev = SimulatedDevice::new().fail_uploads();
    assert!(matches!(
        dev.upload(&[0.0]),
        Err(DeviceError::Allocation(_))
    ));
}

#[test]
fn lease_releases_exactly_once() {
    let dev = Arc::new(SimulatedDevice::new());
    {
        let lease = DeviceLease::acquire(&dev).unwrap();
        assert_eq!(lease.device().name(), "simulated");
        assert_eq!(dev.releases(), 0);
    }
    assert_eq!(dev.opens(), 1);
    assert_eq!(dev.releases(), 1);
}

#[test]
fn missing_device_fails_to_acquire() {
    assert!(matches!(
        DeviceLease::acquire(&NoDevice),
        Err(DeviceError::Unavailable(_))
    ));
}

#[test]
fn frame_payload_round_trips_through_f32() {
    let frame = Frame::solid(2, 1, [10, 20, 30, 255]);
    let flat = frame.to_f32();
    assert_eq!(flat.len(), 8);
    let back = Frame::from_f32(flat, frame.shape()).unwrap();
    assert_eq!(back, frame);
    assert!(Frame::from_f32(vec![0.0; 4], (2, 1)).is_err());
}

#[test]
fn cpu_choice_has_no_factory() {
    assert!(device_factory(DeviceChoice::Cpu).is_none());
}
