mod tests_flush_job;
mod tests_compaction_job;
mod tests_worker;
