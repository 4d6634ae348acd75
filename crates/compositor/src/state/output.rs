//! `wl_seat` and `wl_output` globals

use super::Compositor;
use crate::host::Host;
use crate::protocol::{
    OutputEvent, OutputModeFlags, ObjectId, SeatCapabilities, SeatEvent, Subpixel, Transform,
};
use crate::registry::{BoundResource, ObjectRegistry};

impl<R: ObjectRegistry, H: Host> Compositor<R, H> {
    pub(crate) fn bind_seat(&mut self, seat: BoundResource) {
        self.seat.resources.insert(seat);
        self.registry.send_event(
            seat.id,
            SeatEvent::Capabilities(SeatCapabilities::POINTER | SeatCapabilities::KEYBOARD).into(),
        );
        if seat.version >= 2 {
            let name = self.config.seat_name.clone();
            self.registry.send_event(seat.id, SeatEvent::Name(name).into());
        }
    }

    pub(crate) fn bind_output(&mut self, output: BoundResource) {
        self.outputs.insert(output);
        let geometry = OutputEvent::Geometry {
            x: 0,
            y: 0,
            physical_width: 0,
            physical_height: 0,
            subpixel: Subpixel::Unknown,
            make: self.config.output.make.clone(),
            model: self.config.output.model.clone(),
            transform: Transform::Normal,
        };
        self.registry.send_event(output.id, geometry.into());
        self.refresh_output(output.id);
    }

    pub fn release_output(&mut self, output: ObjectId) {
        self.outputs.remove(output);
        self.registry.destroy_resource(output);
    }

    /// Send scale, current mode and `done` to one output
    fn refresh_output(&mut self, output: ObjectId) {
        let allocation = self.host.allocation();
        let scale = self.host.scale_factor();

        self.registry.send_event(output, OutputEvent::Scale(scale).into());
        self.registry.send_event(
            output,
            OutputEvent::Mode {
                flags: OutputModeFlags::CURRENT | OutputModeFlags::PREFERRED,
                width: allocation.size.w,
                height: allocation.size.h,
                refresh: self.config.output.refresh_mhz,
            }
            .into(),
        );
        self.registry.send_event(output, OutputEvent::Done.into());
    }

    /// Re-describe the output to every client after a geometry or scale change
    pub fn refresh_outputs(&mut self) {
        for output in self.outputs.ids() {
            self.refresh_output(output);
        }
    }
}
