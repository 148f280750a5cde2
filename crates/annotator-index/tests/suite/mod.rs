mod report_directory;
