//! Periodic per-port packet counter sampling.

use sonic_p4rt::{CounterData, P4RuntimeClient};
use tracing::{debug, warn};

use crate::config::SamplerConfig;
use crate::error::Fault;
use crate::fault::FaultReporter;

/// Reads and resets the packet counter of every port.
#[derive(Debug, Clone)]
pub struct PeriodicSampler {
    counter: String,
    ports: u32,
    warn_threshold: i64,
}

impl PeriodicSampler {
    /// Creates a sampler for ports `1..=ports`.
    pub fn new(config: &SamplerConfig, ports: u32) -> Self {
        Self {
            counter: config.counter.clone(),
            ports,
            warn_threshold: config.packet_count_warn,
        }
    }

    /// Samples every port once.
    ///
    /// The first read or reset failure is reported as a fault and ends the
    /// tick. Returns the number of ports fully sampled.
    pub async fn sample(&self, client: &dyn P4RuntimeClient, faults: &FaultReporter) -> u32 {
        debug!(counter = %self.counter, "Reading counter");

        for port in 1..=self.ports {
            let index = i64::from(port);

            let counter = match client.read_counter(&self.counter, index).await {
                Ok(counter) => counter,
                Err(e) => {
                    faults.report(Fault::CounterRead { port, source: e });
                    return port - 1;
                }
            };

            if counter.packet_count > self.warn_threshold {
                warn!(port, packets = counter.packet_count, "Packet count over threshold");
            } else {
                debug!(port, packets = counter.packet_count, "Packet count");
            }

            if let Err(e) = client
                .write_counter(&self.counter, index, CounterData::ZERO)
                .await
            {
                faults.report(Fault::CounterWrite { port, source: e });
                return port - 1;
            }
        }

        self.ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::fault_slot;
    use pretty_assertions::assert_eq;
    use sonic_p4rt::mock::{MockBehavior, MockClient};

    fn sampler(ports: u32) -> PeriodicSampler {
        PeriodicSampler::new(&SamplerConfig::default(), ports)
    }

    #[tokio::test]
    async fn test_sample_reads_and_resets_every_port() {
        let client = MockClient::new(
            1,
            MockBehavior {
                packet_count: 42,
                ..MockBehavior::default()
            },
        );
        let (faults, mut slot) = fault_slot();

        assert_eq!(sampler(3).sample(&client, &faults).await, 3);

        let counter = "MyIngress.port_packets_in".to_string();
        assert_eq!(
            client.counter_reads(),
            vec![(counter.clone(), 1), (counter.clone(), 2), (counter.clone(), 3)]
        );
        assert_eq!(
            client.counter_writes(),
            vec![
                (counter.clone(), 1, CounterData::ZERO),
                (counter.clone(), 2, CounterData::ZERO),
                (counter, 3, CounterData::ZERO),
            ]
        );
        assert!(slot.take().is_none());
    }

    #[tokio::test]
    async fn test_read_failure_aborts_tick() {
        let client = MockClient::new(
            1,
            MockBehavior {
                fail_counter_read: Some(2),
                ..MockBehavior::default()
            },
        );
        let (faults, mut slot) = fault_slot();

        assert_eq!(sampler(3).sample(&client, &faults).await, 1);

        assert_eq!(client.counter_reads().len(), 2);
        assert_eq!(client.counter_writes().len(), 1);
        assert!(matches!(slot.take(), Some(Fault::CounterRead { port: 2, .. })));
    }

    #[tokio::test]
    async fn test_write_failure_aborts_tick() {
        let client = MockClient::new(
            1,
            MockBehavior {
                fail_counter_write: Some(1),
                ..MockBehavior::default()
            },
        );
        let (faults, mut slot) = fault_slot();

        assert_eq!(sampler(3).sample(&client, &faults).await, 0);

        assert_eq!(client.counter_reads().len(), 1);
        assert!(matches!(slot.take(), Some(Fault::CounterWrite { port: 1, .. })));
    }

    #[tokio::test]
    async fn test_no_ports() {
        let client = MockClient::new(1, MockBehavior::default());
        let (faults, _slot) = fault_slot();

        assert_eq!(sampler(0).sample(&client, &faults).await, 0);
        assert!(client.counter_reads().is_empty());
    }
}
